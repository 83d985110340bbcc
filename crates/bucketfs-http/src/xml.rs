//! XML documents written by the server.

use std::io;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

/// Namespace of S3 response documents.
pub const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Format an S3 error as a flat `<Error>` document.
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error>
///   <Code>NoSuchKey</Code>
///   <Message>The specified key does not exist</Message>
///   <Resource>bucket/key</Resource>
///   <RequestId>4442587f-...</RequestId>
///   <HostId>...</HostId>
/// </Error>
/// ```
pub fn error_to_xml(
    code: &str,
    message: &str,
    resource: Option<&str>,
    request_id: &str,
    host_id: &str,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = write_error_xml(&mut buf, code, message, resource, request_id, host_id) {
        tracing::error!(error = %e, "failed to serialize S3 error XML");
        buf.clear();
    }
    buf
}

fn write_error_xml(
    buf: &mut Vec<u8>,
    code: &str,
    message: &str,
    resource: Option<&str>,
    request_id: &str,
    host_id: &str,
) -> io::Result<()> {
    let mut writer = Writer::new(buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.create_element("Error").write_inner_content(|w| {
        w.create_element("Code")
            .write_text_content(BytesText::new(code))?;
        w.create_element("Message")
            .write_text_content(BytesText::new(message))?;
        if let Some(res) = resource {
            w.create_element("Resource")
                .write_text_content(BytesText::new(res))?;
        }
        w.create_element("RequestId")
            .write_text_content(BytesText::new(request_id))?;
        w.create_element("HostId")
            .write_text_content(BytesText::new(host_id))?;
        Ok(())
    })?;

    Ok(())
}

/// The `GetBucketLocation` response. Buckets live in the default region, so
/// the constraint is always empty.
pub fn location_constraint_xml() -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    if let Err(e) = write_location_xml(&mut buf) {
        tracing::error!(error = %e, "failed to serialize LocationConstraint XML");
        buf.clear();
    }
    buf
}

fn write_location_xml(buf: &mut Vec<u8>) -> io::Result<()> {
    let mut writer = Writer::new(buf);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element("LocationConstraint")
        .with_attribute(("xmlns", S3_XMLNS))
        .write_empty()?;
    Ok(())
}
