//! HTML forms

use axum::response::Html;

const TITLE: &str = "CCFS - sealed file drop";

fn layout(body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>{TITLE}</title></head>\n\
         <body>\n<h1>{TITLE}</h1>\n{body}\n</body>\n</html>\n"
    ))
}

pub async fn upload_form() -> Html<String> {
    layout(
        "<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\n\
         <label>Password <input type=\"password\" name=\"password\" required></label>\n\
         <label>File <input type=\"file\" name=\"file\" required></label>\n\
         <button type=\"submit\">Upload</button>\n\
         </form>",
    )
}

/// The form posts back to its own URL, so the key is never echoed into HTML.
pub async fn download_form() -> Html<String> {
    layout(
        "<form method=\"post\">\n\
         <label>Password <input type=\"password\" name=\"password\" required></label>\n\
         <button type=\"submit\">Download</button>\n\
         </form>",
    )
}
