// Response emitters

use crate::{HttpResponse, ResponseEmitter, Result};
use http::StatusCode;
use std::io::Write;

/// Keeps emitted responses in memory.
#[derive(Debug, Default)]
pub struct BufferedEmitter {
    responses: Vec<HttpResponse>,
}

impl BufferedEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responses(&self) -> &[HttpResponse] {
        &self.responses
    }

    pub fn last(&self) -> Option<&HttpResponse> {
        self.responses.last()
    }

    /// Take the most recent response out of the buffer.
    pub fn take(&mut self) -> Option<HttpResponse> {
        self.responses.pop()
    }
}

impl ResponseEmitter for BufferedEmitter {
    fn emit(&mut self, response: &HttpResponse) -> Result<()> {
        self.responses.push(response.clone());
        Ok(())
    }
}

/// Serializes responses as HTTP/1.1 messages onto any writer.
#[derive(Debug)]
pub struct WriterEmitter<W: Write> {
    writer: W,
}

impl<W: Write> WriterEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResponseEmitter for WriterEmitter<W> {
    fn emit(&mut self, response: &HttpResponse) -> Result<()> {
        let reason = StatusCode::from_u16(response.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("");
        write!(self.writer, "HTTP/1.1 {} {}\r\n", response.status, reason)?;

        let mut headers: Vec<_> = response
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("content-length"))
            .collect();
        headers.sort();
        for (name, value) in headers {
            write!(self.writer, "{}: {}\r\n", name, value)?;
        }
        for cookie in &response.cookies {
            write!(self.writer, "Set-Cookie: {}\r\n", cookie)?;
        }
        write!(self.writer, "Content-Length: {}\r\n\r\n", response.body.len())?;

        self.writer.write_all(&response.body)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cookie;

    #[test]
    fn test_buffered_emitter_keeps_responses() {
        let mut emitter = BufferedEmitter::new();
        emitter.emit(&HttpResponse::html("one")).unwrap();
        emitter.emit(&HttpResponse::not_found()).unwrap();

        assert_eq!(emitter.responses().len(), 2);
        assert_eq!(emitter.take().map(|r| r.status), Some(404));
        assert_eq!(emitter.last().map(|r| r.status), Some(200));
    }

    #[test]
    fn test_writer_emitter_serializes_http() {
        let mut emitter = WriterEmitter::new(Vec::new());
        let response = HttpResponse::ok()
            .with_text("hi")
            .with_cookie(Cookie::new("MABS_SESSION", "abc").http_only(false));
        emitter.emit(&response).unwrap();

        let raw = String::from_utf8(emitter.into_inner()).unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(raw.contains("Set-Cookie: MABS_SESSION=abc; Path=/\r\n"));
        assert!(raw.ends_with("Content-Length: 2\r\n\r\nhi"));
    }
}
