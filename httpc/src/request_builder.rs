//! Turns an in-memory [`Request`] into a `reqwest::RequestBuilder`,
//! applying header precedence, query merging, and body encoding.

use reqwest::Url;

use crate::body::Body;
use crate::config::Config;
use crate::cookie::render_cookie_header;
use crate::error::HttpcError;
use crate::request::Request;

/// Precedence, low to high: config defaults, request headers, User-Agent
/// fallback. Returns the final headers (for [`crate::response::Response::request_headers`])
/// alongside the built `reqwest::RequestBuilder`.
pub fn build(
    transport: &reqwest::Client,
    config: &Config,
    request: &Request,
    url: Url,
) -> Result<(reqwest::RequestBuilder, Vec<(String, String)>), HttpcError> {
    let mut url = url;
    merge_query(&mut url, &request.query);

    let mut builder = transport.request(request.method.clone(), url);

    let mut final_headers: Vec<(String, String)> = Vec::new();

    for (name, value) in &config.default_headers {
        if request.headers.get(name).is_none() {
            final_headers.push((name.clone(), value.clone()));
        }
    }
    for (name, value) in request.headers.iter() {
        final_headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        final_headers.push((name.to_string(), value.to_string()));
    }
    if !final_headers
        .iter()
        .any(|(n, _)| n.eq_ignore_ascii_case("user-agent"))
    {
        final_headers.push(("User-Agent".to_string(), config.user_agent.clone()));
    }

    if !request.cookies.is_empty() {
        let header = render_cookie_header(&request.cookies);
        final_headers.retain(|(n, _)| !n.eq_ignore_ascii_case("cookie"));
        final_headers.push(("Cookie".to_string(), header));
    }

    let (builder_with_body, content_type_header) = attach_body(builder, request.body.clone())?;
    builder = builder_with_body;
    if let Some(ct) = content_type_header {
        final_headers.retain(|(n, _)| !n.eq_ignore_ascii_case("content-type"));
        final_headers.push(("Content-Type".to_string(), ct));
    }

    for (name, value) in &final_headers {
        builder = builder.header(name, value);
    }

    Ok((builder, final_headers))
}

fn merge_query(url: &mut Url, query: &std::collections::BTreeMap<String, String>) {
    if query.is_empty() {
        return;
    }
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    for (k, v) in query {
        pairs.push((k.clone(), v.clone()));
    }
    url.query_pairs_mut().clear();
    url.query_pairs_mut().extend_pairs(pairs);
}

/// Attaches the body to the builder, returning an explicit `Content-Type`
/// override when the body variant implies one (multipart's is set
/// directly on the builder via `reqwest`'s own boundary machinery).
fn attach_body(
    builder: reqwest::RequestBuilder,
    body: Body,
) -> Result<(reqwest::RequestBuilder, Option<String>), HttpcError> {
    match body {
        Body::Empty => Ok((builder, None)),
        Body::Text(text) => Ok((builder.body(text), Some("text/plain".to_string()))),
        Body::Bytes(bytes) => Ok((
            builder.body(bytes),
            Some("application/octet-stream".to_string()),
        )),
        Body::ByteStream(bytes) => Ok((builder.body(bytes), None)),
        Body::Json(value) => Ok((builder.json(&value), Some("application/json".to_string()))),
        Body::Xml(xml) => Ok((
            builder.body(xml),
            Some("application/xml".to_string()),
        )),
        Body::Form(pairs) => Ok((
            builder.form(&pairs),
            Some("application/x-www-form-urlencoded".to_string()),
        )),
        Body::Multipart(form) => {
            let form = form.into_reqwest_form()?;
            Ok((builder.multipart(form), None))
        }
        Body::FilePath(path) => {
            let bytes = std::fs::read(&path).map_err(|e| {
                HttpcError::validation(format!("failed to read body file {path:?}: {e}"))
            })?;
            Ok((builder.body(bytes), Some("application/octet-stream".to_string())))
        }
    }
}
