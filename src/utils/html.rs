// src/utils/html.rs

/// Strips markup that could execute in a browser from teacher-supplied quiz text.
///
/// Whitelist based: formatting tags such as <b> or <p> survive, <script> and
/// <iframe> are removed together with their content, event handler attributes go too.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input.map(clean_html)
}
