//! `remote:`-framed messages for git clients.
//!
//! git prints everything the server writes to stderr; prefixing each line
//! with `remote: ` makes server messages recognisable.

use tokio::io::{AsyncWrite, AsyncWriteExt};

const DIVIDER_WIDTH: usize = 72;

/// Format informational messages surrounded by blank `remote:` lines.
#[must_use]
pub fn format_info_messages(messages: &[String]) -> String {
    format_messages(messages, false)
}

/// Format warning messages surrounded by `remote:` divider rulers.
#[must_use]
pub fn format_warning_messages(messages: &[String]) -> String {
    format_messages(messages, true)
}

/// Format a single warning message.
#[must_use]
pub fn format_warning_message(message: &str) -> String {
    format_warning_messages(&[message.to_string()])
}

/// Write informational messages to `out`.
///
/// # Errors
///
/// Returns the underlying I/O error if the write fails.
pub async fn display_info_messages<W>(messages: &[String], out: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_all(out, &format_info_messages(messages)).await
}

/// Write a warning message to `out`.
///
/// # Errors
///
/// Returns the underlying I/O error if the write fails.
pub async fn display_warning_message<W>(message: &str, out: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_all(out, &format_warning_message(message)).await
}

async fn write_all<W>(out: &mut W, text: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if text.is_empty() {
        return Ok(());
    }
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}

fn format_messages(messages: &[String], divider: bool) -> String {
    if messages.iter().all(|m| m.trim().is_empty()) {
        return String::new();
    }

    let frame = if divider {
        format!("{}{}{}", line(""), line(&"=".repeat(DIVIDER_WIDTH)), line(""))
    } else {
        line("")
    };

    let mut out = frame.clone();
    for message in messages {
        out.push_str(&line(message));
    }
    out.push_str(&frame);
    out
}

fn line(message: &str) -> String {
    format!("remote: {message}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_messages() {
        let text = format_info_messages(&["one".to_string(), "two".to_string()]);
        assert_eq!(text, "remote: \nremote: one\nremote: two\nremote: \n");
    }

    #[test]
    fn test_warning_message() {
        let ruler = "=".repeat(72);
        let expected = format!(
            "remote: \nremote: {ruler}\nremote: \nremote: careful\nremote: \nremote: {ruler}\nremote: \n"
        );
        assert_eq!(format_warning_message("careful"), expected);
    }

    #[test]
    fn test_blank_messages_print_nothing() {
        assert!(format_info_messages(&[]).is_empty());
        assert!(format_info_messages(&[" ".to_string()]).is_empty());
    }

    #[tokio::test]
    async fn test_display_writes_to_stream() {
        let mut out: Vec<u8> = Vec::new();
        display_warning_message("boom", &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().contains("remote: boom\n"));
    }
}
