//! Paginated PDF rendering.
//!
//! Builds A4 letters with a letterhead block, word-wrapped body text, an
//! embedded signature image (or the manual-signing placeholder line) and a
//! uniform "Page N sur T" footer. The footer is drawn in a final pass over
//! all pages because the total is only knowable after layout. Merging in
//! [`PdfRenderer::render_many`] happens at the page level after each
//! document rendered independently.

use std::collections::BTreeMap;
use std::io::BufWriter;

use chrono::Utc;
use log::warn;
use lopdf::{dictionary, Document, Object, ObjectId};
use printpdf::image_crate::GenericImageView;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerIndex, PdfPageIndex,
};

use crate::docgen::common::{slugify, today_display_date};
use crate::docgen::fonts;
use crate::docgen::signature::DecodedSignature;
use crate::docgen::template::SIGNATURE_PLACEHOLDER_LINE;
use crate::docgen::{GeneratorError, RenderedDocument, PRODUCT_NAME};

pub const PDF_MIME: &str = "application/pdf";

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const BOTTOM_MARGIN_MM: f32 = 25.0;
pub(crate) const PRINTABLE_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
pub(crate) const BODY_FONT_SIZE: f32 = 11.0;
const TITLE_FONT_SIZE: f32 = 13.0;
const SMALL_FONT_SIZE: f32 = 9.0;
const FOOTER_FONT_SIZE: f32 = 8.0;
const LINE_HEIGHT_MM: f32 = 5.5;
const SIGNATURE_WIDTH_MM: f32 = 60.0;
const IMAGE_DPI: f32 = 300.0;

/// Metadata stamped onto every produced PDF.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub case_number: String,
    pub client_name: String,
}

/// Everything one PDF render needs; constructed fresh per call so
/// concurrent renders share no state.
#[derive(Debug, Clone)]
pub struct PdfRenderRequest {
    pub title: String,
    pub body: String,
    pub info: DocumentInfo,
    pub signature: Option<DecodedSignature>,
}

pub struct PdfRenderer;

impl PdfRenderer {
    /// Render one document to a complete PDF.
    pub fn render(request: &PdfRenderRequest) -> Result<RenderedDocument, GeneratorError> {
        let bytes = render_to_bytes(request)?;
        let bytes = stamp_metadata(bytes, &request.info)?;
        Ok(RenderedDocument {
            filename: format!("{}.pdf", slugify(&request.title, "document")),
            bytes,
            mime_type: PDF_MIME,
            extension: "pdf",
        })
    }

    /// Render each input independently, then copy every page of every
    /// sub-document in input order into one merged PDF.
    pub fn render_many(requests: &[PdfRenderRequest]) -> Result<RenderedDocument, GeneratorError> {
        if requests.is_empty() {
            return Err(GeneratorError::EmptyMerge);
        }

        let parts = requests
            .iter()
            .map(render_to_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        let merged = merge_pdf_parts(parts)?;

        let mut info = requests[0].info.clone();
        info.title = format!("Documents - dossier {}", info.case_number);
        let bytes = stamp_metadata(merged, &info)?;

        Ok(RenderedDocument {
            filename: format!("documents-{}.pdf", slugify(&info.case_number, "dossier")),
            bytes,
            mime_type: PDF_MIME,
            extension: "pdf",
        })
    }
}

/// Footer text for page `n` of `total`.
pub(crate) fn footer_line(n: usize, total: usize) -> String {
    format!("Page {} sur {}", n, total)
}

/// Word-wrap one raw line against the printable width.
///
/// Words are appended to a running buffer while the measured width stays
/// under the limit; the buffer is flushed when the next word would
/// overflow. A single word wider than the limit is split at character
/// granularity so no emitted line ever exceeds the limit.
pub(crate) fn wrap_line(line: &str, font_size: f32, max_width_mm: f32) -> Vec<String> {
    if line.trim().is_empty() {
        return vec![String::new()];
    }

    let mut wrapped = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        for fragment in split_word(word, font_size, max_width_mm) {
            let candidate = if current.is_empty() {
                fragment.clone()
            } else {
                format!("{} {}", current, fragment)
            };
            if current.is_empty() || fonts::text_width_mm(&candidate, font_size) <= max_width_mm {
                current = candidate;
            } else {
                wrapped.push(std::mem::take(&mut current));
                current = fragment;
            }
        }
    }
    if !current.is_empty() {
        wrapped.push(current);
    }
    wrapped
}

/// Split a word that cannot fit on one line into maximal fitting
/// prefixes; a word that fits comes back whole.
fn split_word(word: &str, font_size: f32, max_width_mm: f32) -> Vec<String> {
    if fonts::text_width_mm(word, font_size) <= max_width_mm {
        return vec![word.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        let mut candidate = current.clone();
        candidate.push(ch);
        if current.is_empty() || fonts::text_width_mm(&candidate, font_size) <= max_width_mm {
            current = candidate;
        } else {
            pieces.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

struct PageCursor {
    pages: Vec<(PdfPageIndex, PdfLayerIndex)>,
    current: usize,
    /// Vertical position in mm from the bottom edge.
    y: f32,
}

impl PageCursor {
    fn new(first_page: PdfPageIndex, first_layer: PdfLayerIndex) -> Self {
        Self {
            pages: vec![(first_page, first_layer)],
            current: 0,
            y: PAGE_HEIGHT_MM - MARGIN_MM,
        }
    }

    fn layer(&self, doc: &PdfDocumentReference) -> printpdf::PdfLayerReference {
        let (page, layer) = self.pages[self.current];
        doc.get_page(page).get_layer(layer)
    }

    /// Start a new page when fewer than `needed_mm` of vertical space
    /// remain above the bottom margin; the cursor resets to the top
    /// margin before the pending content is drawn.
    fn ensure_space(&mut self, doc: &PdfDocumentReference, needed_mm: f32) {
        if self.y - needed_mm >= BOTTOM_MARGIN_MM {
            return;
        }
        let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Calque 1");
        self.pages.push((page, layer));
        self.current = self.pages.len() - 1;
        self.y = PAGE_HEIGHT_MM - MARGIN_MM;
    }

    fn text_line(
        &mut self,
        doc: &PdfDocumentReference,
        text: &str,
        size: f32,
        font: &IndirectFontRef,
    ) {
        self.ensure_space(doc, LINE_HEIGHT_MM);
        if !text.is_empty() {
            self.layer(doc)
                .use_text(text, size, Mm(MARGIN_MM), Mm(self.y), font);
        }
        self.y -= LINE_HEIGHT_MM;
    }
}

fn render_to_bytes(request: &PdfRenderRequest) -> Result<Vec<u8>, GeneratorError> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        &request.title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Calque 1",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| GeneratorError::Font(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| GeneratorError::Font(e.to_string()))?;

    let mut cursor = PageCursor::new(first_page, first_layer);

    draw_letterhead(&doc, &mut cursor, request, &font, &bold);

    for raw_line in request.body.lines() {
        for line in wrap_line(raw_line, BODY_FONT_SIZE, PRINTABLE_WIDTH_MM) {
            cursor.text_line(&doc, &line, BODY_FONT_SIZE, &font);
        }
    }

    draw_signature_block(&doc, &mut cursor, request.signature.as_ref(), &font);

    // Page totals are only known now; footers are a final pass.
    let total = cursor.pages.len();
    for (i, (page, layer)) in cursor.pages.iter().enumerate() {
        let layer = doc.get_page(*page).get_layer(*layer);
        layer.use_text(
            footer_line(i + 1, total),
            FOOTER_FONT_SIZE,
            Mm(MARGIN_MM),
            Mm(12.0),
            &font,
        );
        layer.use_text(
            format!("Généré par {}", PRODUCT_NAME),
            FOOTER_FONT_SIZE,
            Mm(MARGIN_MM),
            Mm(8.0),
            &font,
        );
    }

    let mut writer = BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)
        .map_err(|e| GeneratorError::PdfWrite(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| GeneratorError::PdfWrite(e.to_string()))
}

fn draw_letterhead(
    doc: &PdfDocumentReference,
    cursor: &mut PageCursor,
    request: &PdfRenderRequest,
    font: &IndirectFontRef,
    bold: &IndirectFontRef,
) {
    let layer = cursor.layer(doc);
    layer.use_text(
        PRODUCT_NAME,
        TITLE_FONT_SIZE,
        Mm(MARGIN_MM),
        Mm(cursor.y),
        bold,
    );
    cursor.y -= 8.0;

    let layer = cursor.layer(doc);
    layer.use_text(
        request.title.as_str(),
        TITLE_FONT_SIZE,
        Mm(MARGIN_MM),
        Mm(cursor.y),
        bold,
    );
    cursor.y -= 7.0;

    let info = &request.info;
    for line in [
        format!("Dossier n° {}", info.case_number),
        format!("Client : {}", info.client_name),
        format!("Généré le {}", today_display_date()),
    ] {
        let layer = cursor.layer(doc);
        layer.use_text(line, SMALL_FONT_SIZE, Mm(MARGIN_MM), Mm(cursor.y), font);
        cursor.y -= 5.0;
    }
    cursor.y -= 6.0;
}

/// Draw the signature block: a label, then either the embedded image at a
/// fixed display width (aspect ratio preserved) or the placeholder line.
/// The whole block is kept on one page.
fn draw_signature_block(
    doc: &PdfDocumentReference,
    cursor: &mut PageCursor,
    signature: Option<&DecodedSignature>,
    font: &IndirectFontRef,
) {
    let decoded_image = signature.and_then(|sig| {
        match printpdf::image_crate::load_from_memory(&sig.bytes) {
            Ok(img) => Some((sig, img)),
            Err(e) => {
                warn!("signature image could not be decoded, using placeholder: {e}");
                None
            }
        }
    });

    match decoded_image {
        Some((sig, img)) => {
            let (px_w, px_h) = img.dimensions();
            if px_w == 0 || px_h == 0 {
                cursor.text_line(doc, SIGNATURE_PLACEHOLDER_LINE, BODY_FONT_SIZE, font);
                return;
            }
            let native_w_mm = px_w as f32 / IMAGE_DPI * 25.4;
            let native_h_mm = px_h as f32 / IMAGE_DPI * 25.4;
            let scale = SIGNATURE_WIDTH_MM / native_w_mm;
            let height_mm = native_h_mm * scale;

            // Label, image and caption must never split across pages.
            cursor.ensure_space(doc, LINE_HEIGHT_MM * 2.0 + height_mm + 4.0);

            cursor.text_line(doc, "Signature :", SMALL_FONT_SIZE, font);

            let image = Image::from_dynamic_image(&img);
            image.add_to_layer(
                cursor.layer(doc),
                ImageTransform {
                    translate_x: Some(Mm(MARGIN_MM)),
                    translate_y: Some(Mm(cursor.y - height_mm)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    dpi: Some(IMAGE_DPI),
                    ..Default::default()
                },
            );
            cursor.y -= height_mm + 4.0;

            if let Some(ts) = sig.signed_at {
                let caption = format!("Signé le {}", ts.format("%d/%m/%Y %H:%M"));
                cursor.text_line(doc, &caption, SMALL_FONT_SIZE, font);
            }
        }
        None => {
            cursor.ensure_space(doc, LINE_HEIGHT_MM * 2.0);
            cursor.text_line(doc, "Signature :", SMALL_FONT_SIZE, font);
            cursor.text_line(doc, SIGNATURE_PLACEHOLDER_LINE, BODY_FONT_SIZE, font);
        }
    }
}

/// Stamp the Info dictionary onto a finished PDF, unconditionally.
fn stamp_metadata(bytes: Vec<u8>, info: &DocumentInfo) -> Result<Vec<u8>, GeneratorError> {
    let mut doc = Document::load_mem(&bytes).map_err(GeneratorError::PdfDocument)?;
    let now = Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(info.title.clone()),
        "Author" => Object::string_literal(info.author.clone()),
        "Subject" => Object::string_literal(info.subject.clone()),
        "Creator" => Object::string_literal(PRODUCT_NAME),
        "CreationDate" => Object::string_literal(now.clone()),
        "ModDate" => Object::string_literal(now),
    });
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| GeneratorError::PdfDocument(e.into()))?;
    Ok(out)
}

/// Merge independently rendered PDFs at the page level, in input order.
fn merge_pdf_parts(parts: Vec<Vec<u8>>) -> Result<Vec<u8>, GeneratorError> {
    let mut max_id = 1;
    let mut documents_pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut documents_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut merged = Document::with_version("1.5");

    for bytes in parts {
        let mut doc = Document::load_mem(&bytes).map_err(GeneratorError::PdfDocument)?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, object_id) in doc.get_pages() {
            let object = doc
                .get_object(object_id)
                .map_err(GeneratorError::PdfDocument)?
                .to_owned();
            documents_pages.insert(object_id, object);
        }
        documents_objects.extend(doc.objects);
    }

    // "Catalog" and "Pages" are mandatory roots; keep one of each.
    let mut catalog_object: Option<(ObjectId, Object)> = None;
    let mut pages_object: Option<(ObjectId, Object)> = None;

    for (object_id, object) in documents_objects.iter() {
        match object.type_name().unwrap_or("") {
            "Catalog" => {
                catalog_object = Some((
                    catalog_object
                        .as_ref()
                        .map(|(id, _)| *id)
                        .unwrap_or(*object_id),
                    object.clone(),
                ));
            }
            "Pages" => {
                if let Ok(dict) = object.as_dict() {
                    let mut dict = dict.clone();
                    if let Some((_, ref existing)) = pages_object {
                        if let Ok(old_dict) = existing.as_dict() {
                            dict.extend(old_dict);
                        }
                    }
                    pages_object = Some((
                        pages_object
                            .as_ref()
                            .map(|(id, _)| *id)
                            .unwrap_or(*object_id),
                        Object::Dictionary(dict),
                    ));
                }
            }
            "Page" => {}     // re-parented below
            "Outlines" => {} // not carried over
            "Outline" => {}
            _ => {
                merged.objects.insert(*object_id, object.clone());
            }
        }
    }

    let (pages_id, pages_dict) = pages_object.ok_or_else(|| {
        GeneratorError::PdfWrite("merged document has no Pages root".to_string())
    })?;
    let (catalog_id, catalog_dict) = catalog_object.ok_or_else(|| {
        GeneratorError::PdfWrite("merged document has no Catalog root".to_string())
    })?;

    for (object_id, object) in documents_pages.iter() {
        if let Ok(dict) = object.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", pages_id);
            merged
                .objects
                .insert(*object_id, Object::Dictionary(dict));
        }
    }

    if let Ok(dict) = pages_dict.as_dict() {
        let mut dict = dict.clone();
        dict.set("Count", documents_pages.len() as u32);
        dict.set(
            "Kids",
            documents_pages
                .keys()
                .map(|object_id| Object::Reference(*object_id))
                .collect::<Vec<_>>(),
        );
        merged.objects.insert(pages_id, Object::Dictionary(dict));
    }

    if let Ok(dict) = catalog_dict.as_dict() {
        let mut dict = dict.clone();
        dict.set("Pages", pages_id);
        dict.remove(b"Outlines");
        merged.objects.insert(catalog_id, Object::Dictionary(dict));
    }

    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.adjust_zero_pages();
    merged.compress();

    let mut out = Vec::new();
    merged
        .save_to(&mut out)
        .map_err(|e| GeneratorError::PdfDocument(e.into()))?;
    Ok(out)
}
