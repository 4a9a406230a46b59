// Standalone HTML and PDF export of a document.
//
// HTML export is self-contained. PDF rasterization belongs to a renderer
// collaborator; `CommandPdfRenderer` drives an external converter that reads
// HTML on stdin and writes PDF on stdout.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use idox_common::types::DEFAULT_TITLE;
use tracing::{debug, info};

pub const HTML_MIME: &str = "text/html";
pub const PDF_MIME: &str = "application/pdf";

const PAGE_STYLE: &str = "body { font-family: Arial, sans-serif; margin: 40px; line-height: 1.6; }
      h1 { color: #333; border-bottom: 2px solid #333; padding-bottom: 10px; }
      .content { margin-top: 20px; }";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    /// Write into `dir` under the export's file name.
    pub fn write_into(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        self.write_to(&path)?;
        Ok(path)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, &self.bytes)
            .with_context(|| format!("failed to write export to {}", path.display()))?;
        info!(path = %path.display(), bytes = self.bytes.len(), "export written");
        Ok(())
    }
}

/// Turns a standalone HTML page into PDF bytes.
pub trait PdfRenderer {
    fn render_pdf(&self, html: &str) -> Result<Vec<u8>>;
}

/// External HTML-to-PDF converter, e.g. `wkhtmltopdf - -`.
#[derive(Debug, Clone)]
pub struct CommandPdfRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandPdfRenderer {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { program: program.into(), args: args.into_iter().map(Into::into).collect() }
    }

    /// Parse a whitespace-separated command line.
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            bail!("pdf command is empty");
        };
        Ok(Self::new(program, parts))
    }
}

impl PdfRenderer for CommandPdfRenderer {
    fn render_pdf(&self, html: &str) -> Result<Vec<u8>> {
        debug!(program = %self.program, "rendering pdf");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start pdf renderer `{}`", self.program))?;

        let mut stdin = child.stdin.take().context("pdf renderer stdin unavailable")?;
        // stdin is fed from its own thread while stdout and stderr drain here.
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(html.as_bytes()));
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        let output = output.context("pdf renderer did not finish")?;
        if !output.status.success() {
            bail!(
                "pdf renderer `{}` failed ({}): {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        match written {
            Ok(result) => result.context("failed to send html to pdf renderer")?,
            Err(_) => bail!("pdf renderer input thread panicked"),
        }
        Ok(output.stdout)
    }
}

/// Standalone page: escaped title heading followed by the raw body HTML.
pub fn render_page(title: &str, html: &str) -> String {
    let title = escape_html(title);
    format!(
        "<!DOCTYPE html>
<html>
  <head>
    <meta charset=\"utf-8\">
    <title>{title}</title>
    <style>
      {PAGE_STYLE}
    </style>
  </head>
  <body>
    <h1>{title}</h1>
    <div class=\"content\">{html}</div>
  </body>
</html>
"
    )
}

pub fn export_html(title: &str, html: &str) -> ExportedFile {
    ExportedFile {
        file_name: format!("{}.html", sanitize_file_name(title)),
        mime: HTML_MIME,
        bytes: render_page(title, html).into_bytes(),
    }
}

pub fn export_pdf(renderer: &dyn PdfRenderer, title: &str, html: &str) -> Result<ExportedFile> {
    let bytes = renderer
        .render_pdf(&render_page(title, html))
        .with_context(|| format!("failed to export `{title}` as pdf"))?;
    Ok(ExportedFile { file_name: format!("{}.pdf", sanitize_file_name(title)), mime: PDF_MIME, bytes })
}

/// Drop characters that common filesystems reject. Empty names fall back to
/// the default title.
pub fn sanitize_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        cleaned.to_string()
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedRenderer;

    impl PdfRenderer for FixedRenderer {
        fn render_pdf(&self, html: &str) -> Result<Vec<u8>> {
            assert!(html.starts_with("<!DOCTYPE html>"));
            Ok(b"%PDF-1.7".to_vec())
        }
    }

    struct BrokenRenderer;

    impl PdfRenderer for BrokenRenderer {
        fn render_pdf(&self, _html: &str) -> Result<Vec<u8>> {
            bail!("no fonts")
        }
    }

    #[test]
    fn html_export_embeds_body_and_escapes_title() {
        let file = export_html("Q&A <draft>", "<p>Hello</p>");
        assert_eq!(file.mime, HTML_MIME);
        assert_eq!(file.file_name, "Q&A draft.html");
        let page = String::from_utf8(file.bytes).unwrap();
        assert!(page.contains("<title>Q&amp;A &lt;draft&gt;</title>"));
        assert!(page.contains("<h1>Q&amp;A &lt;draft&gt;</h1>"));
        assert!(page.contains("<div class=\"content\"><p>Hello</p></div>"));
        assert!(page.contains("font-family: Arial"));
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("Plans/2024: Q1?"), "Plans2024 Q1");
        assert_eq!(sanitize_file_name("  "), DEFAULT_TITLE);
        assert_eq!(sanitize_file_name("..."), DEFAULT_TITLE);
        assert_eq!(sanitize_file_name("Notes"), "Notes");
    }

    #[test]
    fn pdf_export_uses_renderer() {
        let file = export_pdf(&FixedRenderer, "Report", "<p>x</p>").unwrap();
        assert_eq!(file.file_name, "Report.pdf");
        assert_eq!(file.mime, PDF_MIME);
        assert_eq!(file.bytes, b"%PDF-1.7");
    }

    #[test]
    fn renderer_failure_is_reported() {
        let err = export_pdf(&BrokenRenderer, "Report", "").unwrap_err();
        assert!(format!("{err:#}").contains("no fonts"));
    }

    #[test]
    fn command_line_parsing() {
        assert!(CommandPdfRenderer::from_command_line("   ").is_err());
        let renderer = CommandPdfRenderer::from_command_line("wkhtmltopdf - -").unwrap();
        assert_eq!(renderer.program, "wkhtmltopdf");
        assert_eq!(renderer.args, vec!["-", "-"]);
    }

    #[cfg(unix)]
    #[test]
    fn command_renderer_pipes_through_process() {
        let renderer = CommandPdfRenderer::new("cat", Vec::<String>::new());
        let bytes = renderer.render_pdf("<p>piped</p>").unwrap();
        assert_eq!(bytes, b"<p>piped</p>");
    }

    #[cfg(unix)]
    #[test]
    fn command_renderer_streams_output_larger_than_pipe_buffer() {
        let page = "<p>streamed</p>".repeat(70_000);
        let renderer = CommandPdfRenderer::new("cat", Vec::<String>::new());
        let bytes = renderer.render_pdf(&page).unwrap();
        assert_eq!(bytes.len(), page.len());
    }

    #[test]
    fn missing_renderer_program_fails() {
        let renderer = CommandPdfRenderer::new("idox-no-such-renderer", Vec::<String>::new());
        assert!(renderer.render_pdf("<p></p>").is_err());
    }

    #[test]
    fn write_into_uses_file_name() {
        let dir = TempDir::new().unwrap();
        let path = export_html("Notes", "<p>x</p>").write_into(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("Notes.html"));
        assert!(std::fs::read_to_string(path).unwrap().contains("<h1>Notes</h1>"));
    }
}
