// SPDX-License-Identifier: GPL-3.0-only

//! ZimageZ uploads over its XML-RPC api. Needs an account: login, upload, logout.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::{Digest, Md5};
use reqwest::Client;

use super::{FieldKind, JobLink, UploadError, UploadTransport};

const ENDPOINT: &str = "http://www.zimagez.com/apiXml.php";

const ACCOUNT_MESSAGE: &str = "Please fill the following fields with your ZimageZ account information.";
const LOGIN_FAILED_MESSAGE: &str =
    "Login failed, please check your user name and password and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Param<'a> {
    Str(&'a str),
    Base64(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Value(String),
    Fault(String),
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn method_call(method: &str, params: &[Param<'_>]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<methodCall>\n");
    xml.push_str(&format!("<methodName>{}</methodName>\n<params>\n", escape(method)));
    for param in params {
        let value = match param {
            Param::Str(s) => format!("<string>{}</string>", escape(s)),
            Param::Base64(b) => format!("<base64>{b}</base64>"),
        };
        xml.push_str(&format!("<param><value>{value}</value></param>\n"));
    }
    xml.push_str("</params>\n</methodCall>\n");
    xml
}

/// Offset just past the first `<tag>` start tag, which may carry attributes.
fn open_tag_end(xml: &str, tag: &str) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut from = 0;
    while let Some(found) = xml[from..].find(&needle) {
        let name_end = from + found + needle.len();
        let rest = &xml[name_end..];
        match rest.chars().next() {
            Some('>') => return Some(name_end + 1),
            Some(c) if c.is_whitespace() => return rest.find('>').map(|end| name_end + end + 1),
            // A longer name sharing the prefix, like `params` for `param`
            _ => from = name_end,
        }
    }
    None
}

/// Offset of the first `</tag>` end tag.
fn close_tag_start(xml: &str, tag: &str) -> Option<usize> {
    let needle = format!("</{tag}");
    let mut from = 0;
    while let Some(found) = xml[from..].find(&needle) {
        let start = from + found;
        if xml[start + needle.len()..].trim_start().starts_with('>') {
            return Some(start);
        }
        from = start + needle.len();
    }
    None
}

/// Text between the first `<tag>` and the `</tag>` after it. Values are scalars, never nested.
fn inner<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let start = open_tag_end(xml, tag)?;
    let end = close_tag_start(&xml[start..], tag)? + start;
    Some(&xml[start..end])
}

/// Scalar content of a `<value>`, with or without a type tag.
fn scalar(value: &str) -> String {
    let value = value.trim();
    for tag in ["string", "boolean", "int", "i4", "base64", "double"] {
        if let Some(text) = inner(value, tag) {
            return unescape(text);
        }
    }
    unescape(value)
}

fn parse_reply(xml: &str) -> Result<Reply, UploadError> {
    let body = inner(xml, "methodResponse")
        .ok_or_else(|| UploadError::Protocol("not an XML-RPC answer".to_string()))?;

    if let Some(fault) = inner(body, "fault") {
        let message = fault
            .split("<member")
            .find(|member| member.contains("<name>faultString</name>"))
            .and_then(|member| inner(member, "value"))
            .map_or_else(|| "unknown error".to_string(), scalar);
        return Ok(Reply::Fault(message));
    }

    let value = inner(body, "param")
        .and_then(|param| inner(param, "value"))
        .ok_or_else(|| UploadError::Protocol("empty XML-RPC answer".to_string()))?;
    Ok(Reply::Value(scalar(value)))
}

fn is_refusal(value: &str) -> bool {
    matches!(value.trim(), "" | "0" | "false")
}

fn password_hash(password: &str) -> String {
    format!("{:x}", Md5::digest(password.as_bytes()))
}

/// Prompts until the account fields are filled in.
async fn ensure_account(link: &mut JobLink, message: &str) -> Result<(), UploadError> {
    let mut message = message;
    while !link.fields().has_account() {
        link.ask_for_information(message).await?;
        message = ACCOUNT_MESSAGE;
    }
    Ok(())
}

pub struct ZimagezTransport {
    http: Client,
    endpoint: String,
}

impl ZimagezTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(Client::new(), ENDPOINT)
    }

    /// Calls `endpoint` through `http` instead of the public api.
    #[must_use]
    pub fn with_client(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    async fn call(
        &self,
        link: &mut JobLink,
        method: &str,
        params: &[Param<'_>],
    ) -> Result<Reply, UploadError> {
        log::debug!("ZimageZ call {method}");
        let request = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(method_call(method, params))
            .send();

        let response = tokio::select! {
            response = request => response?,
            () = link.cancelled() => return Err(UploadError::Cancelled),
        };
        let body = response.error_for_status()?.text().await?;
        link.check_cancelled()?;
        parse_reply(&body)
    }

    async fn login(&self, link: &mut JobLink) -> Result<String, UploadError> {
        let mut message = ACCOUNT_MESSAGE;
        loop {
            ensure_account(link, message).await?;
            link.progress("Login on ZimageZ...").await;

            let user = link.fields().get(FieldKind::User).to_string();
            let hash = password_hash(link.fields().get(FieldKind::Password));
            match self
                .call(link, "apiXmlrpc.login", &[Param::Str(&user), Param::Str(&hash)])
                .await?
            {
                Reply::Value(session) if !is_refusal(&session) => return Ok(session),
                Reply::Value(_) | Reply::Fault(_) => {
                    log::info!("ZimageZ refused the login of {user}");
                    // Ask again, starting from the rejected values
                    link.ask_for_information(LOGIN_FAILED_MESSAGE).await?;
                    message = LOGIN_FAILED_MESSAGE;
                }
            }
        }
    }
}

impl Default for ZimagezTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadTransport for ZimagezTransport {
    async fn upload(&self, image: &[u8], link: &mut JobLink) -> Result<String, UploadError> {
        let session = self.login(link).await?;

        link.progress("Upload the screenshot...").await;
        let encoded = STANDARD.encode(image);
        let name = chrono::Local::now()
            .format("Screenshot_%Y-%m-%d_%H-%M-%S.png")
            .to_string();
        let title = link.fields().get(FieldKind::Title).to_string();
        let comment = link.fields().get(FieldKind::Comment).to_string();

        let uploaded = self
            .call(
                link,
                "apiXmlrpc.upload",
                &[
                    Param::Base64(&encoded),
                    Param::Str(&name),
                    Param::Str(&title),
                    Param::Str(&comment),
                    Param::Str(&session),
                ],
            )
            .await;

        link.progress("Close the session on ZimageZ...").await;
        if let Err(e) = self.call(link, "apiXmlrpc.logout", &[Param::Str(&session)]).await {
            log::warn!("ZimageZ logout failed: {e}");
        }

        match uploaded? {
            Reply::Value(upload_name) if !is_refusal(&upload_name) => {
                link.progress("The screenshot has been uploaded.").await;
                Ok(upload_name)
            }
            Reply::Value(_) => Err(UploadError::Service(
                "ZimageZ did not accept the screenshot.".to_string(),
            )),
            Reply::Fault(message) => Err(UploadError::Service(message)),
        }
    }
}
