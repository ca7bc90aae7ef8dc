//! Listing-page fixtures and mock endpoints

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One blog post whose body embeds a file viewer for `file_id` on `host`
pub fn blog_post(title: &str, host: &str, file_id: &str) -> String {
    format!(
        r#"<div class="post-outer">
             <h3 class="post-title entry-title"><a href="{host}/2024/01/episode.html">{title}</a></h3>
             <div class="post-body entry-content">
               Host: George Noory
               Guests: Jane Doe, John Roe
               A night of strange phenomena and open lines.
               <iframe src="{host}/file/d/{file_id}/view" width="640" height="480"></iframe>
             </div>
           </div>"#
    )
}

/// Blog listing with an optional older-posts link
pub fn blog_page(posts: &[String], older: Option<&str>) -> String {
    let pager = older
        .map(|href| {
            format!(r#"<a class="blog-pager-older-link" href="{href}" title="Older Posts">Older Posts</a>"#)
        })
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html><html><head><title>Archive</title></head><body>
           <div class="main-inner"><div class="blog-posts hfeed">{}</div>
           <div class="blog-pager" id="blog-pager">{pager}</div></div>
           </body></html>"#,
        posts.join("\n")
    )
}

/// Torrent index results page with `(title, magnet)` rows
pub fn knaben_page(rows: &[(&str, &str)]) -> String {
    let rows = rows
        .iter()
        .map(|(title, magnet)| {
            format!(
                r#"<tr><td class="text-wrap w-100"><a title="{title}" href="{magnet}">{title}</a></td></tr>"#
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"<html><body><div class="p-3"><table><tbody>{rows}</tbody></table></div></body></html>"#
    )
}

/// Serve `html` at `route`
pub async fn mount_page(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

/// Serve a media payload for `file_id` at the direct-download endpoint, expecting `times` hits
pub async fn mount_payload(server: &MockServer, file_id: &str, body: &[u8], times: u64) {
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("export", "download"))
        .and(query_param("id", file_id))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(body.to_vec()),
        )
        .expect(times)
        .mount(server)
        .await;
}
