use geotrack_domain::{DomainError, DomainResult};

/// Parse a location topic in the format `location/{device_id}`.
///
/// The topic-level device id is used for log correlation only; the payload's
/// `deviceId` field is authoritative.
pub fn parse_topic(topic: &str) -> DomainResult<&str> {
    let device_id = topic
        .strip_prefix("location/")
        .ok_or_else(|| {
            DomainError::MalformedPayload(format!(
                "invalid topic '{topic}': expected 'location/{{device_id}}'"
            ))
        })?
        .trim();

    if device_id.is_empty() || device_id.contains('/') {
        return Err(DomainError::MalformedPayload(format!(
            "invalid topic '{topic}': expected 'location/{{device_id}}'"
        )));
    }

    Ok(device_id)
}
