//! API endpoint URL builders

/// Build submission URL
pub fn submissions_url(base_url: &str) -> String {
    format!("{}/submissions", base_url.trim_end_matches('/'))
}

/// Build the uploads URL listing the samples of one submission
pub fn uploads_url(base_url: &str, submission_id: &str, page_size: usize) -> String {
    format!(
        "{}/uploads?page=0&size={}&sortDirection=ASC&sortField=submitterSampleId&submissionId={}",
        base_url.trim_end_matches('/'),
        page_size.max(1),
        urlencoding::encode(submission_id)
    )
}
