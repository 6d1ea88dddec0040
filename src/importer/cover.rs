//! Cover image extraction (§4.6 step 4): render page 1 of a PDF, or
//! locate and re-encode an EPUB's declared cover image, as a JPEG under
//! the organize base's `.covers` directory. Runs entirely synchronously
//! — callers wrap it in `tokio::task::spawn_blocking` (§9 "Async vs
//! blocking, concretely").

use std::io::Read;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use pdfium_render::prelude::*;
use serde::Deserialize;

use super::error::{ImportError, Result};

/// DPI/quality pair for one cover render, selected by the caller from
/// `PdfConfig`'s low/high tiers (§6.4 `pdf.*`).
#[derive(Debug, Clone, Copy)]
pub struct CoverConfig {
    pub dpi: u32,
    pub quality: u8,
}

/// Extracts a cover image for `source` (a `.pdf` or `.epub` file) into
/// `covers_dir/{stem}.jpg`. Returns `None` (not an error) when the file
/// type has no extractable cover — an EPUB with no identifiable image,
/// for instance — since a missing cover is not itself an import
/// failure (§4.6 step 4 describes extraction, not a hard requirement).
///
/// # Errors
/// Returns [`ImportError::Cover`] if the source file cannot be parsed
/// as a PDF/EPUB, or [`ImportError::Io`] if `covers_dir` cannot be
/// created or the output file cannot be written.
pub fn extract_cover(source: &Path, covers_dir: &Path, stem: &str, config: CoverConfig) -> Result<Option<PathBuf>> {
    let extension = source.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase);

    match extension.as_deref() {
        Some("pdf") => extract_pdf_cover(source, covers_dir, stem, config),
        Some("epub") => extract_epub_cover(source, covers_dir, stem, config),
        _ => Ok(None),
    }
}

fn extract_pdf_cover(source: &Path, covers_dir: &Path, stem: &str, config: CoverConfig) -> Result<Option<PathBuf>> {
    let pdfium = Pdfium::new(
        Pdfium::bind_to_system_library().map_err(|error| ImportError::Cover(error.to_string()))?,
    );
    let document =
        pdfium.load_pdf_from_file(source, None).map_err(|error| ImportError::Cover(error.to_string()))?;
    let page = document.pages().first().map_err(|error| ImportError::Cover(error.to_string()))?;

    let target_width = points_to_pixels(page.width().value, config.dpi);
    let target_height = points_to_pixels(page.height().value, config.dpi);
    let render_config =
        PdfRenderConfig::new().set_target_width(target_width).set_maximum_height(target_height);

    let bitmap =
        page.render_with_config(&render_config).map_err(|error| ImportError::Cover(error.to_string()))?;
    let image = bitmap.as_image();

    std::fs::create_dir_all(covers_dir)?;
    let target = covers_dir.join(format!("{stem}.jpg"));
    let mut out = std::fs::File::create(&target)?;
    JpegEncoder::new_with_quality(&mut out, config.quality)
        .encode_image(&image)
        .map_err(|error| ImportError::Cover(error.to_string()))?;

    Ok(Some(target))
}

fn points_to_pixels(points: f32, dpi: u32) -> i32 {
    ((points / 72.0) * dpi as f32).round() as i32
}

#[derive(Debug, Deserialize)]
struct Container {
    rootfiles: RootFiles,
}

#[derive(Debug, Deserialize)]
struct RootFiles {
    #[serde(rename = "rootfile")]
    rootfile: Vec<RootFile>,
}

#[derive(Debug, Deserialize)]
struct RootFile {
    #[serde(rename = "@full-path")]
    full_path: String,
}

#[derive(Debug, Deserialize)]
struct Package {
    manifest: Manifest,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "item")]
    items: Vec<ManifestItem>,
}

#[derive(Debug, Deserialize, Clone)]
struct ManifestItem {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@media-type", default)]
    media_type: String,
    #[serde(rename = "@properties", default)]
    properties: String,
}

impl ManifestItem {
    fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    fn looks_like_cover(&self) -> bool {
        self.properties.contains("cover-image")
            || self.id.to_lowercase().contains("cover")
            || self.href.to_lowercase().contains("cover")
    }
}

fn extract_epub_cover(source: &Path, covers_dir: &Path, stem: &str, config: CoverConfig) -> Result<Option<PathBuf>> {
    let file = std::fs::File::open(source)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|error| ImportError::Cover(error.to_string()))?;

    let opf_path = find_opf_path(&mut archive)?;
    let Some(opf_path) = opf_path else { return Ok(None) };

    let items = read_manifest(&mut archive, &opf_path)?;
    let Some(item) = pick_cover_item(&items) else { return Ok(None) };

    let opf_dir = Path::new(&opf_path).parent().unwrap_or_else(|| Path::new(""));
    let image_entry_name = opf_dir.join(&item.href).to_string_lossy().replace('\\', "/");

    let mut entry = archive
        .by_name(&image_entry_name)
        .map_err(|error| ImportError::Cover(format!("cover image {image_entry_name} not found in archive: {error}")))?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    drop(entry);

    let decoded =
        image::load_from_memory(&bytes).map_err(|error| ImportError::Cover(error.to_string()))?.to_rgb8();

    std::fs::create_dir_all(covers_dir)?;
    let target = covers_dir.join(format!("{stem}.jpg"));
    let mut out = std::fs::File::create(&target)?;
    JpegEncoder::new_with_quality(&mut out, config.quality)
        .encode_image(&decoded)
        .map_err(|error| ImportError::Cover(error.to_string()))?;

    Ok(Some(target))
}

fn find_opf_path(archive: &mut zip::ZipArchive<std::fs::File>) -> Result<Option<String>> {
    let mut container_xml = String::new();
    match archive.by_name("META-INF/container.xml") {
        Ok(mut entry) => {
            entry.read_to_string(&mut container_xml)?;
        }
        Err(_) => return Ok(None),
    }

    let container: Container = match quick_xml::de::from_str(&container_xml) {
        Ok(container) => container,
        Err(error) => return Err(ImportError::Cover(format!("malformed container.xml: {error}"))),
    };

    Ok(container.rootfiles.rootfile.into_iter().next().map(|root| root.full_path))
}

fn read_manifest(archive: &mut zip::ZipArchive<std::fs::File>, opf_path: &str) -> Result<Vec<ManifestItem>> {
    let mut opf_xml = String::new();
    archive
        .by_name(opf_path)
        .map_err(|error| ImportError::Cover(format!("opf file {opf_path} not found: {error}")))?
        .read_to_string(&mut opf_xml)?;

    let package: Package = quick_xml::de::from_str(&opf_xml)
        .map_err(|error| ImportError::Cover(format!("malformed package document: {error}")))?;
    Ok(package.manifest.items)
}

fn pick_cover_item(items: &[ManifestItem]) -> Option<&ManifestItem> {
    items
        .iter()
        .find(|item| item.properties.contains("cover-image"))
        .or_else(|| items.iter().find(|item| item.looks_like_cover()))
        .or_else(|| items.iter().find(|item| item.is_image()))
}
