use smoke::capture::{Artifact, ArtifactSink, CaptureError, Clock, Timestamp};

use wasm_bindgen::{JsCast, JsValue};

/// Hands artifacts to the browser as downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserDownload {
    /// Click a temporary `<a download>` link.
    Anchor,
    /// Anchors without a `download` attribute can't name the file, so the
    /// page is pointed at the data instead.
    Navigate,
}

impl BrowserDownload {
    pub fn detect(document: &web_sys::Document) -> Result<Self, JsValue> {
        let anchor = document.create_element("a")?;
        let strategy = if js_sys::Reflect::has(&anchor, &JsValue::from_str("download"))? {
            BrowserDownload::Anchor
        } else {
            BrowserDownload::Navigate
        };

        log::debug!("Saving files with {:?}", strategy);
        Ok(strategy)
    }

    fn download(&self, artifact: &Artifact) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or("no global `window` exists")?;

        let bytes = js_sys::Uint8Array::from(artifact.bytes.as_slice());
        let options = web_sys::BlobPropertyBag::new();
        options.set_type(&artifact.mime);
        let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(
            &js_sys::Array::of1(&bytes),
            &options,
        )?;
        let url = web_sys::Url::create_object_url_with_blob(&blob)?;

        match self {
            BrowserDownload::Anchor => {
                let document = window.document().ok_or("no document on window")?;
                let body = document.body().ok_or("the document has no body")?;

                let anchor = document
                    .create_element("a")?
                    .dyn_into::<web_sys::HtmlAnchorElement>()?;
                anchor.set_href(&url);
                anchor.set_download(&artifact.file_name);

                body.append_child(&anchor)?;
                anchor.click();
                anchor.remove();

                web_sys::Url::revoke_object_url(&url)
            }

            // The page is replaced, so the URL lives until then.
            BrowserDownload::Navigate => window.location().replace(&url),
        }
    }
}

impl ArtifactSink for BrowserDownload {
    fn save(&mut self, artifact: &Artifact) -> Result<(), CaptureError> {
        self.download(artifact)
            .map_err(|err| CaptureError::Export {
                file_name: artifact.file_name.clone(),
                reason: describe(&err),
            })?;

        log::info!("💾 Downloaded {}", artifact.file_name);
        Ok(())
    }
}

/// Wall-clock time from `Date.now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now(&self) -> Timestamp {
        js_sys::Date::now()
    }
}

pub fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}
