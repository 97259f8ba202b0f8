//! Unit tests for lenient recovery of model output.

use job_caster::intake::extract::{image_data_url, recover_jobs};
use serde_json::Value;

#[test]
fn plain_array_is_returned_in_order() {
    let jobs = recover_jobs(r#"[{"job_title": "A"}, {"job_title": "B"}]"#);

    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[1].get("job_title"), Some(&Value::from("B")));
}

#[test]
fn code_fences_are_stripped() {
    let jobs = recover_jobs("```json\n[{\"job_title\": \"Rigger\"}]\n```");

    assert_eq!(jobs.len(), 1);
}

#[test]
fn single_object_inside_prose_becomes_one_job() {
    let jobs = recover_jobs("Here is the job: {\"job_title\": \"Rigger\", \"team\": \"art\"} Hope it helps.");

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].get("team"), Some(&Value::from("art")));
}

#[test]
fn non_object_elements_are_dropped() {
    let jobs = recover_jobs(r#"[1, "two", {"job_title": "A"}, null]"#);

    assert_eq!(jobs.len(), 1);
}

#[test]
fn unusable_output_yields_nothing() {
    assert!(recover_jobs("").is_empty());
    assert!(recover_jobs("   \n ").is_empty());
    assert!(recover_jobs("Sorry, I could not find any jobs.").is_empty());
    assert!(recover_jobs("[not json at all]").is_empty());
    assert!(recover_jobs("[1, 2, 3]").is_empty());
}

#[test]
fn image_data_url_sniffs_common_formats() {
    assert!(image_data_url(b"\xff\xd8\xff\xe0rest").starts_with("data:image/jpeg;base64,"));
    assert!(image_data_url(b"\x89PNG\r\n\x1a\n").starts_with("data:image/png;base64,"));
    assert!(image_data_url(b"GIF89a").starts_with("data:image/gif;base64,"));
    assert!(image_data_url(b"RIFF\0\0\0\0WEBPVP8 ").starts_with("data:image/webp;base64,"));
    assert_eq!(image_data_url(b"abc"), "data:application/octet-stream;base64,YWJj");
}
