// SPDX-License-Identifier: GPL-3.0-only

//! Links and embed code for an uploaded screenshot

use super::JobType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLinks {
    pub image_url: String,
    pub thumbnail_url: String,
    pub small_thumbnail_url: String,
}

impl UploadLinks {
    #[must_use]
    pub fn new(job_type: JobType, upload_name: &str) -> Self {
        match job_type {
            JobType::Imgur | JobType::ImgurCopy => Self {
                image_url: format!("http://i.imgur.com/{upload_name}.png"),
                thumbnail_url: format!("http://imgur.com/{upload_name}l.png"),
                small_thumbnail_url: format!("http://imgur.com/{upload_name}s.png"),
            },
            JobType::ZimageZ => Self {
                image_url: format!("http://www.zimagez.com/zimage/{upload_name}.php"),
                thumbnail_url: format!("http://www.zimagez.com/miniature/{upload_name}.php"),
                small_thumbnail_url: format!("http://www.zimagez.com/avatar/{upload_name}.php"),
            },
        }
    }

    /// Thumbnail linking to the full size image
    #[must_use]
    pub fn html(&self) -> String {
        format!(
            "<a href=\"{}\">\n  <img src=\"{}\" />\n</a>",
            escape_markup(&self.image_url),
            escape_markup(&self.thumbnail_url)
        )
    }

    /// BBCode for forums
    #[must_use]
    pub fn bbcode(&self) -> String {
        format!(
            "[url={}]\n  [img]{}[/img]\n[/url]",
            self.image_url, self.thumbnail_url
        )
    }
}

fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[must_use]
pub fn dialog_title(job_type: JobType) -> String {
    format!("My screenshot on {}", job_type.service_name())
}

/// Displays the outcome of a completed upload. Read only: closing it has no effect on the job.
pub trait ResultPresenter: Send + Sync {
    fn present_links(&self, title: &str, links: &UploadLinks);

    fn copy_link(&self, url: &str);
}

/// Shows the links dialog, or for `ImgurCopy` puts the image link on the clipboard instead.
pub fn present_result<P: ResultPresenter + ?Sized>(presenter: &P, job_type: JobType, upload_name: &str) {
    let links = UploadLinks::new(job_type, upload_name);
    if job_type.copies_link() {
        presenter.copy_link(&links.image_url);
    } else {
        presenter.present_links(&dialog_title(job_type), &links);
    }
}
