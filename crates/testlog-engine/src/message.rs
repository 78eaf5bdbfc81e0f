use testlog_error::{ErrorCategory, Result, ResultExt, validation_error};
use testlog_ports::ContentStore;
use testlog_schema::case::TestMessage;
use testlog_schema::step::SourceArtifact;

/// Materialize a message window from the stored source artifact.
///
/// Invalid UTF-8 is replaced rather than rejected; captured output is not
/// guaranteed to be text.
pub fn read_message<C: ContentStore + ?Sized>(
    content: &C,
    source: &SourceArtifact,
    message: &TestMessage,
) -> Result<String> {
    if message.artifact_id != source.id {
        return Err(validation_error("message points into a different artifact")
            .with_context("message_artifact", message.artifact_id.to_string())
            .with_context("artifact", source.id.to_string()));
    }
    let blob = source.blob.as_ref().ok_or_else(|| {
        validation_error("source artifact payload was never stored")
            .with_context("artifact", source.id.to_string())
    })?;
    let payload = content
        .get(blob)
        .categorize(ErrorCategory::ContentStore, "read source artifact")
        .map_err(|e| e.with_context("artifact", source.id.to_string()))?;

    let window = window(message, payload.len()).ok_or_else(|| {
        validation_error("message window outside source artifact")
            .with_context("label", message.label.clone())
            .with_context("start", message.start_offset.to_string())
            .with_context("length", message.length.to_string())
            .with_context("size", payload.len().to_string())
    })?;
    Ok(String::from_utf8_lossy(&payload[window]).into_owned())
}

fn window(message: &TestMessage, size: usize) -> Option<std::ops::Range<usize>> {
    let start = usize::try_from(message.start_offset).ok()?;
    let length = usize::try_from(message.length).ok()?;
    let end = start.checked_add(length)?;
    (end <= size).then_some(start..end)
}
