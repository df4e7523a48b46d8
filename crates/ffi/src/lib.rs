use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use credsign_engine::adapters::stream::{SeekOrigin, StreamAdapter, StreamCallbacks};
use credsign_engine::crypto::signer::{SignerCapability, SignerConfig, SignerError};
use credsign_engine::domain::types as dt;
use credsign_engine::{
    Assertion, C2paEngine, CallbackSigner, ClaimGeneratorInfo, EngineError, Ingredient, ManifestBuilder,
    ManifestStoreReader, ResourceRef,
};

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum FfiError {
    #[error("{message}")]
    InvalidPath { message: String },
    #[error("{message}")]
    MalformedManifest { message: String },
    #[error("{message}")]
    ResourceNotFound { message: String },
    #[error("{message}")]
    Signing { message: String },
    #[error("{message}")]
    Verification { message: String },
    #[error("{message}")]
    UnsupportedAssertionLabel { message: String },
    #[error("{message}")]
    AlreadySigned { message: String },
    #[error("{message}")]
    Config { message: String },
    #[error("{message}")]
    Generic { message: String },
}

impl From<EngineError> for FfiError {
    fn from(e: EngineError) -> Self {
        let message = e.to_string();
        match e {
            EngineError::InvalidPath { .. } => FfiError::InvalidPath { message },
            EngineError::MalformedManifest(_) => FfiError::MalformedManifest { message },
            EngineError::ResourceNotFound(_) => FfiError::ResourceNotFound { message },
            EngineError::Signing { .. } => FfiError::Signing { message },
            EngineError::Verification { .. } => FfiError::Verification { message },
            EngineError::UnsupportedAssertionLabel { .. } => FfiError::UnsupportedAssertionLabel { message },
            EngineError::AlreadySigned => FfiError::AlreadySigned { message },
            EngineError::Config(_) => FfiError::Config { message },
            _ => FfiError::Generic { message },
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for FfiError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        FfiError::Signing { message: e.reason }
    }
}

// ===== Foreign signer =====

/// Implemented by the host; called exactly once per signed asset.
#[uniffi::export(callback_interface)]
pub trait FfiSignerCallback: Send + Sync {
    fn sign(&self, data: Vec<u8>) -> Result<Vec<u8>, FfiError>;
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiSignerConfig {
    pub alg: String,
    /// PEM chain, leaf first.
    pub certs: String,
    pub time_authority_url: Option<String>,
    pub use_ocsp: bool,
    pub max_signature_length: Option<u64>,
}

impl From<FfiSignerConfig> for SignerConfig {
    fn from(v: FfiSignerConfig) -> Self {
        SignerConfig {
            alg: v.alg,
            certs: v.certs,
            time_authority_url: v.time_authority_url,
            use_ocsp: v.use_ocsp,
        }
    }
}

fn callback_signer(callback: Box<dyn FfiSignerCallback>, config: FfiSignerConfig) -> Arc<dyn SignerCapability> {
    let max = config.max_signature_length;
    let signer = CallbackSigner::new(config.into(), move |data| {
        callback
            .sign(data.to_vec())
            .map_err(|e| SignerError::Callback(e.to_string()))
    });
    match max {
        Some(len) => Arc::new(signer.with_max_signature_length(len as usize)),
        None => Arc::new(signer),
    }
}

// ===== Foreign streams =====

#[derive(uniffi::Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiSeekMode {
    Start,
    Current,
    End,
}

impl From<SeekOrigin> for FfiSeekMode {
    fn from(v: SeekOrigin) -> Self {
        match v {
            SeekOrigin::Start => FfiSeekMode::Start,
            SeekOrigin::Current => FfiSeekMode::Current,
            SeekOrigin::End => FfiSeekMode::End,
        }
    }
}

/// A host-owned byte stream. Inputs only need read and seek; outputs also
/// need write and flush.
#[uniffi::export(callback_interface)]
pub trait FfiStream: Send + Sync {
    /// Up to `length` bytes; an empty result means end of stream.
    fn read_stream(&self, length: u64) -> Result<Vec<u8>, FfiError>;
    /// Returns the new absolute position.
    fn seek_stream(&self, offset: i64, mode: FfiSeekMode) -> Result<u64, FfiError>;
    /// Returns the number of bytes accepted.
    fn write_stream(&self, data: Vec<u8>) -> Result<u64, FfiError>;
    fn flush_stream(&self) -> Result<(), FfiError>;
}

struct ForeignStream(Box<dyn FfiStream>);

fn stream_error(e: FfiError) -> io::Error {
    io::Error::other(e.to_string())
}

impl StreamCallbacks for ForeignStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.0.read_stream(buf.len() as u64).map_err(stream_error)?;
        if data.len() > buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("stream returned {} bytes for a {} byte read", data.len(), buf.len()),
            ));
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> io::Result<u64> {
        self.0.seek_stream(offset, origin.into()).map_err(stream_error)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.0.write_stream(buf.to_vec()).map_err(stream_error)?;
        usize::try_from(n)
            .ok()
            .filter(|n| *n <= buf.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("stream reported {n} bytes written")))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush_stream().map_err(stream_error)
    }
}

// ===== Settings =====

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiTrustPolicyConfig {
    pub anchors: Option<Vec<u8>>,          // PEM trust anchors
    pub allowed_list: Option<Vec<u8>>,     // PEM end-entity certificates
    pub allowed_ekus: Option<Vec<String>>, // EKU OIDs
}

impl From<FfiTrustPolicyConfig> for dt::TrustPolicyConfig {
    fn from(v: FfiTrustPolicyConfig) -> Self {
        dt::TrustPolicyConfig { anchors: v.anchors, allowed_list: v.allowed_list, allowed_ekus: v.allowed_ekus }
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiBuilderSettings {
    pub claim_generator: Option<String>,
    pub trust_settings: Option<String>,
    pub trust_policy: Option<FfiTrustPolicyConfig>,
    pub verify_after_sign: bool,
    pub allow_insecure_http: bool,
}

impl From<FfiBuilderSettings> for dt::BuilderSettings {
    fn from(v: FfiBuilderSettings) -> Self {
        let mut settings = match v.claim_generator {
            Some(name) => dt::BuilderSettings::new(name),
            None => dt::BuilderSettings::default(),
        };
        settings.trust_settings = v.trust_settings;
        settings.trust_policy = v.trust_policy.map(Into::into);
        settings.verify_after_sign = v.verify_after_sign;
        settings.allow_insecure_http = v.allow_insecure_http;
        settings
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiReaderSettings {
    pub trust_settings: Option<String>,
    pub trust_policy: Option<FfiTrustPolicyConfig>,
    pub allow_remote_manifests: bool,
}

impl From<FfiReaderSettings> for dt::ReaderSettings {
    fn from(v: FfiReaderSettings) -> Self {
        dt::ReaderSettings {
            trust_policy: v.trust_policy.map(Into::into),
            allow_remote_manifests: v.allow_remote_manifests,
            trust_settings: v.trust_settings,
        }
    }
}

fn locked<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, FfiError> {
    m.lock().map_err(|_| FfiError::Generic { message: "object lock poisoned by an earlier panic".into() })
}

// ===== Builder =====

#[derive(uniffi::Object)]
pub struct FfiManifestBuilder {
    inner: Mutex<ManifestBuilder<C2paEngine>>,
}

#[uniffi::export]
impl FfiManifestBuilder {
    #[uniffi::constructor]
    pub fn new(
        settings: FfiBuilderSettings,
        definition_json: String,
        signer: Box<dyn FfiSignerCallback>,
        signer_config: FfiSignerConfig,
    ) -> Result<Arc<Self>, FfiError> {
        let builder = ManifestBuilder::from_json(settings.into(), &definition_json, callback_signer(signer, signer_config))?;
        Ok(Arc::new(Self { inner: Mutex::new(builder) }))
    }

    pub fn set_title(&self, title: String) -> Result<(), FfiError> {
        locked(&self.inner)?.set_title(title)?;
        Ok(())
    }

    pub fn set_format(&self, format: String) -> Result<(), FfiError> {
        locked(&self.inner)?.set_format(format)?;
        Ok(())
    }

    /// `{"label": ..., "data": ...}`, optionally with `"kind": "Json" | "Cbor"`.
    pub fn add_assertion_json(&self, assertion_json: String) -> Result<(), FfiError> {
        let assertion = Assertion::from_json(&assertion_json)?;
        locked(&self.inner)?.add_assertion(assertion)?;
        Ok(())
    }

    /// With `source_path`, the ingredient is built from that asset at sign time.
    pub fn add_ingredient_json(&self, ingredient_json: String, source_path: Option<String>) -> Result<(), FfiError> {
        let ingredient: Ingredient = serde_json::from_str(&ingredient_json)
            .map_err(|e| FfiError::MalformedManifest { message: format!("malformed manifest: ingredient: {e}") })?;
        let mut builder = locked(&self.inner)?;
        match source_path {
            Some(path) => builder.add_ingredient_from_file(ingredient, PathBuf::from(path))?,
            None => builder.add_ingredient(ingredient)?,
        };
        Ok(())
    }

    pub fn add_claim_generator_info(&self, name: String, version: Option<String>) -> Result<(), FfiError> {
        locked(&self.inner)?.add_claim_generator_info(ClaimGeneratorInfo::new(name, version.as_deref()))?;
        Ok(())
    }

    pub fn add_resource_file(&self, identifier: String, path: String) -> Result<(), FfiError> {
        locked(&self.inner)?.add_resource(identifier, PathBuf::from(path))?;
        Ok(())
    }

    pub fn set_thumbnail(&self, format: String, identifier: String) -> Result<(), FfiError> {
        locked(&self.inner)?.set_thumbnail(ResourceRef::new(format, identifier))?;
        Ok(())
    }

    pub fn sign_file(&self, input_path: String, output_path: String) -> Result<(), FfiError> {
        locked(&self.inner)?.sign(input_path, output_path)?;
        Ok(())
    }

    /// Sign from `input` into `output`. `format` defaults to the definition's.
    pub fn sign_stream(
        &self,
        format: Option<String>,
        input: Box<dyn FfiStream>,
        output: Box<dyn FfiStream>,
    ) -> Result<(), FfiError> {
        let mut input = StreamAdapter::new(ForeignStream(input));
        let mut output = StreamAdapter::new(ForeignStream(output));
        locked(&self.inner)?.sign_stream(format.as_deref(), &mut input, &mut output)?;
        Ok(())
    }

    pub fn definition_json(&self) -> Result<String, FfiError> {
        Ok(locked(&self.inner)?.definition_json()?)
    }

    pub fn rebuild(&self) -> Result<(), FfiError> {
        locked(&self.inner)?.rebuild();
        Ok(())
    }
}

// ===== Reader =====

#[derive(uniffi::Object)]
pub struct FfiManifestStoreReader {
    inner: Mutex<ManifestStoreReader<C2paEngine>>,
}

#[uniffi::export]
impl FfiManifestStoreReader {
    #[uniffi::constructor]
    pub fn new(settings: Option<FfiReaderSettings>) -> Arc<Self> {
        let settings: dt::ReaderSettings = settings.map(Into::into).unwrap_or_default();
        Arc::new(Self { inner: Mutex::new(ManifestStoreReader::new(settings)) })
    }

    /// Store JSON, or `None` when the asset carries no manifest.
    pub fn read_json_from_file(&self, path: String) -> Result<Option<String>, FfiError> {
        Ok(locked(&self.inner)?.read_json_from_file(path)?)
    }

    /// Store JSON of an asset held by the host, or `None` when it carries no manifest.
    pub fn read_json_from_stream(&self, format: String, stream: Box<dyn FfiStream>) -> Result<Option<String>, FfiError> {
        let mut stream = StreamAdapter::new(ForeignStream(stream));
        Ok(locked(&self.inner)?.read_json_from_stream(&format, &mut stream)?)
    }

    /// Active manifest label of the last read store.
    pub fn active_manifest_label(&self) -> Result<Option<String>, FfiError> {
        let reader = locked(&self.inner)?;
        Ok(reader.last_store().and_then(|s| s.active_manifest()).map(str::to_string))
    }

    pub fn resource_to_file(&self, manifest_label: String, identifier: String, path: String) -> Result<u64, FfiError> {
        Ok(locked(&self.inner)?.resource_to_file(&manifest_label, &identifier, path)?)
    }
}

// ===== Free functions =====

#[uniffi::export]
pub fn version() -> String {
    credsign_engine::version()
}

#[uniffi::export]
pub fn supported_extensions() -> Vec<String> {
    credsign_engine::supported_extensions()
}

#[uniffi::export]
pub fn generate_instance_id() -> String {
    credsign_engine::generate_instance_id()
}


uniffi::setup_scaffolding!();
