/// HTTP endpoint paths, relative to the metadata or storage node.
pub mod endpoints {
    pub const METADATA_GET: &str = "/api/v2/metadata/get";
    pub const METADATA_ADD: &str = "/api/v2/metadata/add";
    pub const METADATA_DELETE: &str = "/api/v2/metadata/delete";
    pub const METADATA_GET_PUBLIC: &str = "/api/v2/metadata/get-public";

    pub const INIT_UPLOAD: &str = "/api/v2/sia/init-upload";
    pub const UPLOAD_PART: &str = "/api/v2/sia/upload";
    pub const UPLOAD_STATUS: &str = "/api/v1/upload-status";
    pub const DOWNLOAD: &str = "/api/v2/download";
    pub const DELETE: &str = "/api/v1/delete";

    /// Suffixes appended to a resolved download URL.
    pub const DOWNLOAD_METADATA_SUFFIX: &str = "/metadata";
    pub const DOWNLOAD_FILE_SUFFIX: &str = "/file";
}

/// Join a node base URL and an endpoint path.
pub fn url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
