//! Caller-facing avatar input.
//!
//! [`AvatarInput`] is what a form embeds: it holds the committed value, the id
//! the visible label points at, and a change callback. Editing happens in the
//! wrapped [`CropSession`]; only a successful [`AvatarInput::save`] changes the
//! value and fires the callback.

use crate::config::CropPolicy;
use crate::error::Result;
use crate::imaging::{EncodedAvatar, ImageBackend, SourceImage, is_data_url};
use crate::session::{CropSession, HostCommand};
use log::debug;
use std::fmt;

type ChangeCallback = Box<dyn FnMut(&str) + Send>;

pub struct AvatarInput<B: ImageBackend> {
    input_id: String,
    value: String,
    on_change: Option<ChangeCallback>,
    session: CropSession<B>,
}

impl<B: ImageBackend + 'static> AvatarInput<B> {
    /// `value` may be a `data:` URL or any other image address; it is shown
    /// until the first save replaces it.
    pub fn new(
        input_id: impl Into<String>,
        value: impl Into<String>,
        policy: CropPolicy,
        backend: B,
    ) -> Self {
        Self {
            input_id: input_id.into(),
            value: value.into(),
            on_change: None,
            session: CropSession::new(policy, backend),
        }
    }

    /// Register the callback invoked with the new payload after each save.
    pub fn on_change(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// The id a `<label for=...>` should target.
    pub fn label_for(&self) -> &str {
        &self.input_id
    }

    pub fn session(&self) -> &CropSession<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut CropSession<B> {
        &mut self.session
    }

    /// Save the session and commit its payload as the new value.
    ///
    /// On error the value is untouched and the callback is not invoked.
    pub async fn save(&mut self) -> Result<EncodedAvatar> {
        let avatar = self.session.save().await?;
        self.value = avatar.as_str().to_string();
        debug!("input {} committed {}", self.input_id, avatar.fingerprint());
        if let Some(callback) = self.on_change.as_mut() {
            callback(&self.value);
        }
        Ok(avatar)
    }

    /// Drain side effects for the host, e.g. clearing the file control.
    pub fn take_commands(&mut self) -> Vec<HostCommand> {
        self.session.take_commands()
    }

    /// Decode the committed value when it is an embedded payload.
    ///
    /// Remote addresses cannot be previewed locally and yield `None`.
    pub fn preview(&self) -> Result<Option<SourceImage>> {
        if !is_data_url(&self.value) {
            return Ok(None);
        }
        let bytes = EncodedAvatar::parse(&self.value)?.decode_bytes()?;
        self.session.backend().decode(&bytes).map(Some)
    }
}

impl<B: ImageBackend> fmt::Debug for AvatarInput<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarInput")
            .field("input_id", &self.input_id)
            .field("value_len", &self.value.len())
            .field("has_on_change", &self.on_change.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AvatarError;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{Dimensions, RustBackend};
    use crate::session::FileSelection;
    use crate::test_helpers::{gradient_image, png_bytes};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    const REMOTE: &str = "https://cdn.example.com/u/42.png";

    fn mock_input(images: Vec<Dimensions>) -> AvatarInput<MockBackend> {
        AvatarInput::new(
            "avatar",
            REMOTE,
            CropPolicy::default(),
            MockBackend::with_dimensions(images),
        )
    }

    fn open_with_image(input: &mut AvatarInput<MockBackend>) {
        let session = input.session_mut();
        let ticket = session
            .select_file(Some(&FileSelection::from_path("/tmp/me.png")))
            .unwrap();
        session.complete_decode(ticket, b"img").unwrap();
    }

    #[test]
    fn exposes_initial_value_and_label() {
        let input = mock_input(vec![]);
        assert_eq!(input.value(), REMOTE);
        assert_eq!(input.label_for(), "avatar");
    }

    #[tokio::test]
    async fn save_commits_value_and_notifies() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut input = mock_input(vec![Dimensions {
            width: 1000,
            height: 800,
        }]);
        let sink = Arc::clone(&seen);
        input.on_change(move |v| sink.lock().unwrap().push(v.to_string()));

        open_with_image(&mut input);
        input.session_mut().complete_crop(Instant::now()).unwrap();
        let avatar = input.save().await.unwrap();

        assert_eq!(input.value(), avatar.as_str());
        assert_eq!(*seen.lock().unwrap(), vec![avatar.into_string()]);
        assert_eq!(input.take_commands(), vec![HostCommand::ResetFileInput]);
    }

    #[tokio::test]
    async fn failed_save_leaves_value_untouched() {
        let calls = Arc::new(Mutex::new(0));
        let mut input = mock_input(vec![Dimensions {
            width: 1000,
            height: 800,
        }]);
        let counter = Arc::clone(&calls);
        input.on_change(move |_| *counter.lock().unwrap() += 1);

        open_with_image(&mut input);
        assert!(matches!(input.save().await, Err(AvatarError::NoSurface)));

        assert_eq!(input.value(), REMOTE);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn closing_keeps_value_and_resets_file_control() {
        let mut input = mock_input(vec![Dimensions {
            width: 600,
            height: 600,
        }]);
        open_with_image(&mut input);

        input.session_mut().close();

        assert_eq!(input.value(), REMOTE);
        assert_eq!(input.take_commands(), vec![HostCommand::ResetFileInput]);
    }

    #[test]
    fn remote_value_has_no_preview() {
        let input = mock_input(vec![]);
        assert!(input.preview().unwrap().is_none());
    }

    #[test]
    fn data_url_value_previews_its_pixels() {
        let image = gradient_image(32, 24);
        let url = EncodedAvatar::from_encoded(
            crate::imaging::OutputFormat::Png,
            &png_bytes(&image),
        );
        let input = AvatarInput::new(
            "avatar",
            url.as_str(),
            CropPolicy::default(),
            RustBackend::new(),
        );

        let preview = input.preview().unwrap().unwrap();
        assert_eq!(preview.pixels(), &image);
    }

    #[test]
    fn malformed_data_url_is_an_error() {
        let input = AvatarInput::new(
            "avatar",
            "data:image/png;base64,@@@",
            CropPolicy::default(),
            RustBackend::new(),
        );
        assert!(matches!(
            input.preview(),
            Err(AvatarError::InvalidPayload(_))
        ));
    }
}
