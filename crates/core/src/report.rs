//! Report composition.
//!
//! Turns an ordered checklist into a single self-contained HTML document. Images referenced
//! by a section are fetched from the workspace and embedded as `data:` URIs. An image that
//! cannot be fetched, for whatever reason, is replaced by the fallback asset in identical
//! markup, so the layout never depends on which images happened to be available.
//!
//! Composition fails only when the workspace path is malformed or the fallback asset itself
//! is missing, both of which are configuration problems rather than data problems.

use crate::config::CoreConfig;
use crate::constants::{DEFAULT_IMAGE_MEDIA_TYPE, PHOTO_KEYWORDS};
use crate::error::{FormsError, FormsResult, Stage};
use crate::html::{self, SectionMarkup};
use crate::within_deadline;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use closeout_store::{path, ObjectStore, StoreError};
use closeout_types::{NonEmptyText, PathSegment};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// One checklist line item.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Section {
    pub text: String,
    pub done: bool,
    /// File names inside the workspace, in display order
    #[serde(default)]
    pub images: Vec<String>,
}

/// What ended up in one image slot of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSlot {
    /// The referenced image was fetched and embedded
    Embedded { filename: String },
    /// The fallback asset was rendered instead; `filename` is `None` for a slot added
    /// because the text asked for a photo that was never attached
    Fallback { filename: Option<String> },
}

impl ImageSlot {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// A section as it was rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    pub text: String,
    pub done: bool,
    pub slots: Vec<ImageSlot>,
}

/// A composed report, ready to be uploaded.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    html: String,
    target_path: String,
    generated_at: DateTime<Utc>,
    sections: Vec<RenderedSection>,
}

impl ReportDocument {
    pub fn bytes(&self) -> &[u8] {
        self.html.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.html.into_bytes()
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Where the document belongs in the workspace
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// Timestamp rendered into the `generated-at` footer
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Sections in input order
    pub fn sections(&self) -> &[RenderedSection] {
        &self.sections
    }
}

/// An image ready to be embedded.
struct Embedded {
    src: String,
}

impl Embedded {
    fn from_bytes(bytes: &[u8]) -> Self {
        let media_type = infer::get(bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or(DEFAULT_IMAGE_MEDIA_TYPE);
        Self {
            src: format!("data:{};base64,{}", media_type, STANDARD.encode(bytes)),
        }
    }
}

/// Composes report documents from a workspace.
#[derive(Clone)]
pub struct ReportComposer {
    store: Arc<dyn ObjectStore>,
    cfg: Arc<CoreConfig>,
}

impl ReportComposer {
    pub fn new(store: Arc<dyn ObjectStore>, cfg: Arc<CoreConfig>) -> Self {
        Self { store, cfg }
    }

    /// Composes the report for `sections`, stamped with the current time.
    pub async fn compose(
        &self,
        employee_name: &NonEmptyText,
        sections: &[Section],
        workspace_path: &str,
    ) -> FormsResult<ReportDocument> {
        self.compose_at(employee_name, sections, workspace_path, Utc::now())
            .await
    }

    /// Composes the report for `sections` with an explicit generation timestamp.
    ///
    /// The output is a deterministic function of the arguments and of which image fetches
    /// succeeded.
    ///
    /// # Errors
    ///
    /// - `FormsError::Configuration` if `workspace_path` is not a folder below the root
    ///   prefix, or the fallback asset does not exist
    /// - `FormsError::Auth` if the store rejects the credentials while loading the fallback
    /// - `FormsError::Store` if the fallback asset cannot be fetched for another reason
    #[instrument(skip(self, employee_name, sections), fields(sections = sections.len()))]
    pub async fn compose_at(
        &self,
        employee_name: &NonEmptyText,
        sections: &[Section],
        workspace_path: &str,
        generated_at: DateTime<Utc>,
    ) -> FormsResult<ReportDocument> {
        if !self.cfg.is_workspace_path(workspace_path) {
            return Err(FormsError::Configuration(format!(
                "workspace path {workspace_path} is not a folder under {}",
                self.cfg.root_prefix()
            )));
        }

        let fallback = self.load_fallback().await?;

        let mut rendered = Vec::with_capacity(sections.len());
        let mut embedded: Vec<Vec<Option<Embedded>>> = Vec::with_capacity(sections.len());
        for section in sections {
            let (slots, images) = self.render_section(section, workspace_path).await;
            rendered.push(RenderedSection {
                text: section.text.clone(),
                done: section.done,
                slots,
            });
            embedded.push(images);
        }

        let markup: Vec<SectionMarkup<'_>> = rendered
            .iter()
            .zip(&embedded)
            .map(|(section, images)| SectionMarkup {
                section,
                sources: images
                    .iter()
                    .map(|image| image.as_ref().map_or(fallback.src.as_str(), |i| i.src.as_str()))
                    .collect(),
            })
            .collect();
        let html = html::render(employee_name.as_str(), &fallback.src, &markup, generated_at);

        let fallbacks = rendered
            .iter()
            .flat_map(|s| &s.slots)
            .filter(|slot| slot.is_fallback())
            .count();
        info!(size = html.len(), fallbacks, "report composed");

        Ok(ReportDocument {
            html,
            target_path: self.cfg.report_path(workspace_path),
            generated_at,
            sections: rendered,
        })
    }

    async fn load_fallback(&self) -> FormsResult<Embedded> {
        let asset = self.cfg.fallback_asset();
        match within_deadline(self.cfg.request_timeout(), self.store.download(asset)).await {
            Ok(bytes) => Ok(Embedded::from_bytes(&bytes)),
            Err(StoreError::NotFound(_)) => Err(FormsError::Configuration(format!(
                "fallback asset {asset} is missing"
            ))),
            Err(e) => Err(FormsError::from_store(Stage::Compose, e)),
        }
    }

    /// Fetches a section's images with bounded fan-out, keeping input order.
    ///
    /// `None` marks a slot that falls back.
    async fn render_section(
        &self,
        section: &Section,
        workspace_path: &str,
    ) -> (Vec<ImageSlot>, Vec<Option<Embedded>>) {
        if section.images.is_empty() {
            if expects_photo(&section.text) {
                return (vec![ImageSlot::Fallback { filename: None }], vec![None]);
            }
            return (Vec::new(), Vec::new());
        }

        let fetches: Vec<_> = section
            .images
            .iter()
            .map(|filename| self.fetch_image(workspace_path, filename))
            .collect();
        let fetched: Vec<Option<Embedded>> = stream::iter(fetches)
            .buffered(self.cfg.limits().image_fan_out)
            .collect()
            .await;

        let slots = section
            .images
            .iter()
            .zip(&fetched)
            .map(|(filename, image)| match image {
                Some(_) => ImageSlot::Embedded {
                    filename: filename.clone(),
                },
                None => ImageSlot::Fallback {
                    filename: Some(filename.clone()),
                },
            })
            .collect();
        (slots, fetched)
    }

    async fn fetch_image(&self, workspace_path: &str, filename: &str) -> Option<Embedded> {
        let segment = match PathSegment::new(filename) {
            Ok(segment) => segment,
            Err(e) => {
                warn!(filename, error = %e, "unusable image name; using fallback");
                return None;
            }
        };
        let image_path = path::join(workspace_path, segment.as_str());
        match within_deadline(self.cfg.request_timeout(), self.store.download(&image_path)).await
        {
            Ok(bytes) => Some(Embedded::from_bytes(&bytes)),
            Err(e) => {
                warn!(path = %image_path, error = %e, "image unavailable; using fallback");
                None
            }
        }
    }
}

/// Returns true if the section text asks for photographic evidence.
pub fn expects_photo(text: &str) -> bool {
    let lowered = text.to_lowercase();
    PHOTO_KEYWORDS.iter().any(|word| lowered.contains(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use chrono::TimeZone;
    use closeout_store::{MemoryStore, Operation, WriteMode};
    use std::time::Duration;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0, 0x10, b'J', b'F', b'I', b'F'];

    fn section(text: &str, done: bool, images: &[&str]) -> Section {
        Section {
            text: text.into(),
            done,
            images: images.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn employee(name: &str) -> NonEmptyText {
        NonEmptyText::new(name).unwrap()
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap()
    }

    fn fallback_src() -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(PNG_MAGIC))
    }

    fn jpeg_src() -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(JPEG_MAGIC))
    }

    async fn setup_with(limits: Limits) -> (Arc<MemoryStore>, ReportComposer) {
        let store = Arc::new(MemoryStore::new());
        store
            .upload("/forms/logo.png", PNG_MAGIC.to_vec(), WriteMode::Overwrite)
            .await
            .unwrap();
        store.create_folder("/forms/branch12").await.unwrap();
        let cfg = Arc::new(CoreConfig::new("/forms", None, limits).unwrap());
        (store.clone(), ReportComposer::new(store, cfg))
    }

    async fn setup() -> (Arc<MemoryStore>, ReportComposer) {
        setup_with(Limits::default()).await
    }

    #[tokio::test]
    async fn test_done_section_with_available_image() {
        let (store, composer) = setup().await;
        store
            .upload("/forms/branch12/a.jpg", JPEG_MAGIC.to_vec(), WriteMode::Overwrite)
            .await
            .unwrap();

        let doc = composer
            .compose(
                &employee("Dana"),
                &[section("Door locked", true, &["a.jpg"])],
                "/forms/branch12",
            )
            .await
            .unwrap();

        assert!(doc
            .html()
            .contains("<td class=\"done\">בוצע</td><td>Door locked</td>"));
        assert!(doc.html().contains("Dana"));
        assert!(doc.html().contains(&html::image_tag(&jpeg_src())));
        assert_eq!(
            doc.sections()[0].slots,
            vec![ImageSlot::Embedded {
                filename: "a.jpg".into()
            }]
        );
        assert_eq!(doc.target_path(), "/forms/branch12/report.html");
    }

    #[tokio::test]
    async fn test_missing_image_renders_fallback() {
        let (_store, composer) = setup().await;

        let doc = composer
            .compose(
                &employee("Dana"),
                &[section("Door locked", true, &["a.jpg"])],
                "/forms/branch12",
            )
            .await
            .unwrap();

        assert_eq!(
            doc.sections()[0].slots,
            vec![ImageSlot::Fallback {
                filename: Some("a.jpg".into())
            }]
        );
        assert!(doc.html().contains(&html::image_tag(&fallback_src())));
    }

    #[tokio::test]
    async fn test_failing_fetch_does_not_affect_siblings() {
        let (store, composer) = setup().await;
        for name in ["1.jpg", "2.jpg", "3.jpg"] {
            store
                .upload(
                    &format!("/forms/branch12/{name}"),
                    JPEG_MAGIC.to_vec(),
                    WriteMode::Overwrite,
                )
                .await
                .unwrap();
        }
        store.fail_on(
            Operation::Download,
            "/forms/branch12/2.jpg",
            StoreError::Transport("connection reset".into()),
        );

        let doc = composer
            .compose(
                &employee("Dana"),
                &[section("Shelves", false, &["1.jpg", "2.jpg", "3.jpg"])],
                "/forms/branch12",
            )
            .await
            .unwrap();

        let slots = &doc.sections()[0].slots;
        assert!(!slots[0].is_fallback());
        assert!(slots[1].is_fallback());
        assert!(!slots[2].is_fallback());
        assert_eq!(doc.html().matches("class=\"photo\"").count(), 3);
    }

    #[tokio::test]
    async fn test_path_like_image_name_falls_back() {
        let (store, composer) = setup().await;
        store
            .upload("/forms/secret.jpg", JPEG_MAGIC.to_vec(), WriteMode::Overwrite)
            .await
            .unwrap();

        let doc = composer
            .compose(
                &employee("Dana"),
                &[section("Door", true, &["../secret.jpg"])],
                "/forms/branch12",
            )
            .await
            .unwrap();

        assert!(doc.sections()[0].slots[0].is_fallback());
        assert!(!doc.html().contains(&jpeg_src()));
    }

    #[tokio::test]
    async fn test_section_order_is_preserved() {
        let (_store, composer) = setup().await;
        let input = vec![
            section("third", false, &[]),
            section("first", true, &[]),
            section("second", false, &[]),
        ];

        let doc = composer
            .compose(&employee("Dana"), &input, "/forms/branch12")
            .await
            .unwrap();

        let texts: Vec<&str> = doc.sections().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["third", "first", "second"]);
        let html = doc.html();
        let third = html.find("<td>third</td>").unwrap();
        let first = html.find("<td>first</td>").unwrap();
        let second = html.find("<td>second</td>").unwrap();
        assert!(third < first && first < second);
    }

    #[tokio::test]
    async fn test_empty_section_list_yields_valid_document() {
        let (_store, composer) = setup().await;

        let doc = composer
            .compose(&employee("Dana"), &[], "/forms/branch12")
            .await
            .unwrap();

        assert!(doc.sections().is_empty());
        assert_eq!(doc.html().matches("class=\"section\"").count(), 0);
        assert!(doc.html().starts_with("<!DOCTYPE html>"));
        assert!(doc.html().contains("</table>"));
        assert!(doc.html().trim_end().ends_with("</html>"));
    }

    #[tokio::test]
    async fn test_photo_keyword_without_images_renders_one_fallback() {
        let (_store, composer) = setup().await;

        let doc = composer
            .compose(
                &employee("Dana"),
                &[
                    section("צלם תמונה של הקופה", true, &[]),
                    section("Take a PHOTO of the safe", true, &[]),
                    section("Lights off", true, &[]),
                ],
                "/forms/branch12",
            )
            .await
            .unwrap();

        assert_eq!(
            doc.sections()[0].slots,
            vec![ImageSlot::Fallback { filename: None }]
        );
        assert_eq!(doc.sections()[1].slots.len(), 1);
        assert!(doc.sections()[2].slots.is_empty());
        assert_eq!(doc.html().matches("class=\"photo\"").count(), 2);
    }

    #[tokio::test]
    async fn test_user_text_is_escaped() {
        let (_store, composer) = setup().await;

        let doc = composer
            .compose(
                &employee("<script>"),
                &[section("a < b & c", false, &[])],
                "/forms/branch12",
            )
            .await
            .unwrap();

        assert!(!doc.html().contains("<script>"));
        assert!(doc
            .html()
            .contains("<td class=\"fail\">לא בוצע</td><td>a &lt; b &amp; c</td>"));
    }

    #[tokio::test]
    async fn test_output_is_deterministic_apart_from_timestamp() {
        let (store, composer) = setup().await;
        store
            .upload("/forms/branch12/a.jpg", JPEG_MAGIC.to_vec(), WriteMode::Overwrite)
            .await
            .unwrap();
        let input = vec![section("Door locked", true, &["a.jpg", "missing.jpg"])];

        let first = composer
            .compose_at(&employee("Dana"), &input, "/forms/branch12", fixed_time())
            .await
            .unwrap();
        let second = composer
            .compose_at(&employee("Dana"), &input, "/forms/branch12", fixed_time())
            .await
            .unwrap();
        assert_eq!(first.bytes(), second.bytes());
        assert!(first
            .html()
            .contains("<footer class=\"generated-at\">הופק: 2026-10-18T09:30:00Z</footer>"));

        let later = composer
            .compose_at(
                &employee("Dana"),
                &input,
                "/forms/branch12",
                fixed_time() + chrono::Duration::hours(1),
            )
            .await
            .unwrap();
        let mask = |html: &str| html.split("<footer").next().unwrap_or_default().to_string();
        assert_ne!(first.html(), later.html());
        assert_eq!(mask(first.html()), mask(later.html()));
    }

    #[tokio::test]
    async fn test_missing_fallback_asset_is_configuration_error() {
        let store = Arc::new(MemoryStore::new());
        store.create_folder("/forms/branch12").await.unwrap();
        let composer = ReportComposer::new(store, Arc::new(CoreConfig::with_defaults()));

        let result = composer
            .compose(&employee("Dana"), &[], "/forms/branch12")
            .await;

        assert!(matches!(result, Err(FormsError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_workspace_outside_root_is_configuration_error() {
        let (_store, composer) = setup().await;

        for bad in ["/other/branch12", "/forms", "forms/branch12", "/forms/../x"] {
            let result = composer.compose(&employee("Dana"), &[], bad).await;
            assert!(
                matches!(result, Err(FormsError::Configuration(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_image_fetches_are_bounded() {
        let limits = Limits {
            image_fan_out: 3,
            ..Limits::default()
        };
        let (store, composer) = setup_with(limits).await;
        let names: Vec<String> = (0..10).map(|i| format!("{i}.jpg")).collect();
        for name in &names {
            store
                .upload(
                    &format!("/forms/branch12/{name}"),
                    JPEG_MAGIC.to_vec(),
                    WriteMode::Overwrite,
                )
                .await
                .unwrap();
        }
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let doc = composer
            .compose(&employee("Dana"), &[section("Shelves", true, &refs)], "/forms/branch12")
            .await
            .unwrap();

        assert_eq!(doc.sections()[0].slots.len(), 10);
        assert!(doc.sections()[0].slots.iter().all(|s| !s.is_fallback()));
        assert!(store.max_downloads_in_flight() <= 3);
        assert!(store.max_downloads_in_flight() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_image_times_out_to_fallback() {
        let limits = Limits {
            request_timeout: Duration::from_millis(50),
            ..Limits::default()
        };
        let (store, composer) = setup_with(limits).await;
        for name in ["slow.jpg", "a.jpg"] {
            store
                .upload(
                    &format!("/forms/branch12/{name}"),
                    JPEG_MAGIC.to_vec(),
                    WriteMode::Overwrite,
                )
                .await
                .unwrap();
        }
        store.delay_on(
            Operation::Download,
            "/forms/branch12/slow.jpg",
            Duration::from_secs(30),
        );

        let started = tokio::time::Instant::now();
        let doc = composer
            .compose(
                &employee("Dana"),
                &[section("Door", true, &["slow.jpg", "a.jpg"])],
                "/forms/branch12",
            )
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(30));
        let slots = &doc.sections()[0].slots;
        assert_eq!(
            slots[0],
            ImageSlot::Fallback {
                filename: Some("slow.jpg".into())
            }
        );
        assert_eq!(
            slots[1],
            ImageSlot::Embedded {
                filename: "a.jpg".into()
            }
        );
        assert!(doc.html().contains(&jpeg_src()));
    }

    #[tokio::test]
    async fn test_timeout_error_renders_fallback() {
        let limits = Limits {
            request_timeout: Duration::from_millis(50),
            ..Limits::default()
        };
        let (store, composer) = setup_with(limits).await;
        store.fail_on(
            Operation::Download,
            "/forms/branch12/slow.jpg",
            StoreError::Timeout(Duration::from_millis(50)),
        );

        let doc = composer
            .compose(
                &employee("Dana"),
                &[section("Door", true, &["slow.jpg"])],
                "/forms/branch12",
            )
            .await
            .unwrap();

        assert!(doc.sections()[0].slots[0].is_fallback());
    }

    #[test]
    fn test_expects_photo() {
        assert!(expects_photo("יש לצרף תמונה"));
        assert!(expects_photo("Photo of the register"));
        assert!(!expects_photo("Lights off"));
    }
}
