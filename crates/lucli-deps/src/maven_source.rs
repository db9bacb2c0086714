//! `maven` dependency source: resolve `groupId:artifactId:version[:classifier]`
//! coordinates to an artifact URL on Maven Central (or a configured mirror),
//! then delegate to [`crate::http_source`].

use crate::DepsError;

const DEFAULT_REPOSITORY: &str = "https://repo1.maven.org/maven2";

/// Parse `group:artifact:version` (optionally `group:artifact:version:classifier`)
/// into a download URL under `repository_base`.
pub fn resolve_url(coordinates: &str, repository_base: Option<&str>) -> Result<String, DepsError> {
    let parts: Vec<&str> = coordinates.split(':').collect();
    if parts.len() < 3 {
        return Err(DepsError::MalformedEntry(
            coordinates.to_owned(),
            "maven coordinates must be 'group:artifact:version[:classifier]'".to_owned(),
        ));
    }
    let group = parts[0];
    let artifact = parts[1];
    let version = parts[2];
    let classifier = parts.get(3).copied();

    let group_path = group.replace('.', "/");
    let base = repository_base.unwrap_or(DEFAULT_REPOSITORY);
    let file_name = match classifier {
        Some(classifier) => format!("{artifact}-{version}-{classifier}.jar"),
        None => format!("{artifact}-{version}.jar"),
    };

    Ok(format!(
        "{base}/{group_path}/{artifact}/{version}/{file_name}"
    ))
}

pub fn fetch(coordinates: &str, repository_base: Option<&str>) -> Result<(Vec<u8>, String), DepsError> {
    let url = resolve_url(coordinates, repository_base)?;
    let bytes = crate::http_source::download(&url)?;
    Ok((bytes, url))
}
