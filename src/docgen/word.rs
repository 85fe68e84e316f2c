//! Word document rendering.
//!
//! Produces a real `.docx` binary, independent of the PDF path but with
//! the exact same signature-or-placeholder policy: an undecodable or
//! unsupported signature emits the placeholder line instead of leaving
//! the document malformed.

use std::io::Cursor;

use docx_rs::{BreakType, Docx, Paragraph, Pic, Run};
use image::GenericImageView;
use log::warn;

use crate::docgen::common::slugify;
use crate::docgen::signature::DecodedSignature;
use crate::docgen::template::SIGNATURE_PLACEHOLDER_LINE;
use crate::docgen::{GeneratorError, RenderedDocument};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Display width of the embedded signature, in EMU (60 mm).
const SIGNATURE_WIDTH_EMU: u32 = 60 * 36_000;

pub struct WordRenderer;

impl WordRenderer {
    /// Render a filled letter body into a Word document.
    pub fn render(
        title: &str,
        body: &str,
        signature: Option<&DecodedSignature>,
    ) -> Result<RenderedDocument, GeneratorError> {
        let mut docx = Docx::new();

        docx = docx.add_paragraph(
            Paragraph::new().add_run(Run::new().add_text(title).bold().size(28)),
        );
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::TextWrapping)));

        for line in body.lines() {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
        }

        docx = append_signature(docx, signature);

        let mut cursor = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut cursor)
            .map_err(|e| GeneratorError::DocxPack(e.to_string()))?;

        Ok(RenderedDocument {
            filename: format!("{}.docx", slugify(title, "document")),
            bytes: cursor.into_inner(),
            mime_type: DOCX_MIME,
            extension: "docx",
        })
    }
}

/// Embed the signature image at a fixed display box, or fall back to the
/// same underscore placeholder the PDF path draws.
fn append_signature(mut docx: Docx, signature: Option<&DecodedSignature>) -> Docx {
    let decoded = signature.and_then(|sig| match image::load_from_memory(&sig.bytes) {
        Ok(img) => {
            let (w, h) = img.dimensions();
            if w == 0 || h == 0 {
                None
            } else {
                Some((sig, w, h))
            }
        }
        Err(e) => {
            warn!("signature image could not be decoded, using placeholder: {e}");
            None
        }
    });

    docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text("Signature :")));

    match decoded {
        Some((sig, w, h)) => {
            let height_emu =
                (SIGNATURE_WIDTH_EMU as u64 * h as u64 / w as u64) as u32;
            let pic = Pic::new(sig.bytes.as_slice()).size(SIGNATURE_WIDTH_EMU, height_emu);
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_image(pic)));
            if let Some(ts) = sig.signed_at {
                docx = docx.add_paragraph(Paragraph::new().add_run(
                    Run::new().add_text(format!("Signé le {}", ts.format("%d/%m/%Y %H:%M"))),
                ));
            }
            docx
        }
        None => docx.add_paragraph(
            Paragraph::new().add_run(Run::new().add_text(SIGNATURE_PLACEHOLDER_LINE)),
        ),
    }
}
