//! Unit tests for HTML visible-text extraction.

use job_caster::intake::fetch::extract_visible_text;

#[test]
fn scripts_and_styles_are_dropped() {
    let html = r#"<html><head><title>Jobs</title><style>body { color: red; }</style>
        <script>var tracking = true;</script></head>
        <body><h1>Environment Artist</h1><noscript>Enable JS</noscript>
        <p>  Voxel Labs is hiring.  </p></body></html>"#;

    let text = extract_visible_text(html);

    assert_eq!(text, "Jobs\nEnvironment Artist\nVoxel Labs is hiring.");
}

#[test]
fn blank_lines_are_collapsed() {
    let html = "<div>\n\n   first\n\n\n   second   \n</div><div>   </div><p>third</p>";

    assert_eq!(extract_visible_text(html), "first\nsecond\nthird");
}

#[test]
fn empty_document_yields_empty_text() {
    assert_eq!(extract_visible_text(""), "");
    assert_eq!(extract_visible_text("<script>only()</script>"), "");
}
