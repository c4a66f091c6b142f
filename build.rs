// SPDX-License-Identifier: GPL-3.0-only

use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Short commit hash is appended to `--version` when building from a checkout.
    EmitBuilder::builder().git_sha(true).emit()?;
    Ok(())
}
