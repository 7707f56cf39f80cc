use crate::error::{IoContext, TransferError};
use indicatif::ProgressBar;
use reqwest::{
    blocking::{Body, Client, Response},
    header,
};
use serde::Deserialize;
use std::{fs::File, io, io::Write, path::Path, time::Duration};
use tracing::debug;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.scw.iliad.fr/freetransfert/v2/";
pub const DEFAULT_SHARE_URL: &str = "https://transfert.free.fr/";

/// What the service knows about a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInfo {
    /// Stored path of the file to fetch.
    pub path: String,
    /// Whether `path` is the zip bundle of a multi-file transfer.
    pub is_zip: bool,
}

/// The remote side of a transfer.
pub trait TransferService {
    fn transfer_info(&self, key: &str) -> Result<TransferInfo, TransferError>;

    /// Signed URL the content of `path` can be fetched from.
    fn download_url(&self, key: &str, path: &str) -> Result<Url, TransferError>;

    /// Stream the body at `url` into `writer`, advancing `progress`.
    fn fetch(
        &self,
        url: &Url,
        writer: &mut dyn Write,
        progress: &ProgressBar,
    ) -> Result<u64, TransferError>;

    /// Upload `artifact`, returning the share link.
    fn upload(&self, artifact: &Path, progress: &ProgressBar) -> Result<Url, TransferError>;
}

/// Extract the transfer key from a share link, or accept a bare key.
pub fn transfer_key(link: &str) -> Option<String> {
    let link = link.trim().trim_matches(['\'', '"']);
    match Url::parse(link) {
        Ok(url) => url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()
            .map(str::to_string),
        Err(_) if !link.is_empty() && !link.contains('/') => Some(link.to_string()),
        Err(_) => None,
    }
}

#[derive(Deserialize)]
struct ServiceError {
    error: Option<serde_json::Value>,
    message: Option<serde_json::Value>,
}

impl ServiceError {
    fn into_message(self) -> Option<String> {
        let value = self.message.or(self.error)?;
        Some(match value {
            serde_json::Value::String(message) => message,
            other => other.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct StoredFile {
    path: String,
}

#[derive(Deserialize)]
struct TransferInfoResponse {
    zip: Option<StoredFile>,
    #[serde(default)]
    files: Vec<StoredFile>,
}

#[derive(Deserialize)]
struct FileUrlResponse {
    url: Url,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTransferResponse {
    transfer_key: String,
}

pub struct FreeTransferClient {
    api_url: Url,
    share_url: Url,
    inner_client: Client,
}

impl FreeTransferClient {
    pub fn new(api_url: Url, share_url: Url) -> Result<Self, TransferError> {
        Ok(Self {
            api_url,
            share_url,
            inner_client: Client::builder()
                .user_agent(concat!(
                    env!("CARGO_PKG_NAME"),
                    "/",
                    env!("CARGO_PKG_VERSION")
                ))
                .timeout(Duration::from_secs(48 * 60 * 60)) // 48 hours.
                .build()?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransferError> {
        self.api_url
            .join(path)
            .map_err(|err| TransferError::Api(format!("invalid endpoint '{path}': {err}")))
    }

    /// Decode a JSON body, turning service-side errors into [`TransferError::Api`].
    fn json<T: for<'de> Deserialize<'de>>(
        res: Response,
        request: &str,
    ) -> Result<T, TransferError> {
        let status = res.status();
        let body = res.text()?;
        if let Some(message) = serde_json::from_str::<ServiceError>(&body)
            .ok()
            .and_then(ServiceError::into_message)
        {
            return Err(TransferError::Api(format!("{request}: {message}")));
        }
        if !status.is_success() {
            return Err(TransferError::Api(format!(
                "server returned status code {status} from {request} request. {body}"
            )));
        }
        serde_json::from_str(&body)
            .map_err(|err| TransferError::Api(format!("malformed {request} response: {err}")))
    }
}

impl TransferService for FreeTransferClient {
    fn transfer_info(&self, key: &str) -> Result<TransferInfo, TransferError> {
        let url = self.endpoint(&format!("transfers/{key}"))?;
        debug!("fetching transfer info from {url}");
        let info: TransferInfoResponse =
            Self::json(self.inner_client.get(url).send()?, "transfer info")?;

        if let Some(zip) = info.zip {
            return Ok(TransferInfo {
                path: zip.path,
                is_zip: true,
            });
        }
        info.files
            .into_iter()
            .next()
            .map(|file| TransferInfo {
                path: file.path,
                is_zip: false,
            })
            .ok_or_else(|| TransferError::Api(format!("transfer '{key}' contains no files")))
    }

    fn download_url(&self, key: &str, path: &str) -> Result<Url, TransferError> {
        let mut url = self.endpoint("files")?;
        url.query_pairs_mut()
            .append_pair("transferKey", key)
            .append_pair("path", path);
        debug!("fetching file url from {url}");
        let res: FileUrlResponse = Self::json(self.inner_client.get(url).send()?, "file url")?;
        Ok(res.url)
    }

    fn fetch(
        &self,
        url: &Url,
        writer: &mut dyn Write,
        progress: &ProgressBar,
    ) -> Result<u64, TransferError> {
        let mut res = self.inner_client.get(url.clone()).send()?;
        if !res.status().is_success() {
            return Err(TransferError::Api(format!(
                "server returned status code {} from download request",
                res.status()
            )));
        }
        if let Some(len) = res.content_length() {
            progress.set_length(len);
        }
        io::copy(&mut res, &mut progress.wrap_write(writer))
            .io_context(|| "failed while downloading transfer")
    }

    fn upload(&self, artifact: &Path, progress: &ProgressBar) -> Result<Url, TransferError> {
        let file = File::open(artifact)
            .io_context(|| format!("failed to open '{}'", artifact.display()))?;
        let len = file
            .metadata()
            .io_context(|| format!("failed to read '{}'", artifact.display()))?
            .len();
        let name = artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        progress.set_length(len);

        let mut url = self.endpoint("transfers")?;
        url.query_pairs_mut().append_pair("path", &name);
        debug!("uploading '{}' ({len} bytes) to {url}", artifact.display());
        let res = self
            .inner_client
            .post(url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::sized(progress.wrap_read(file), len))
            .send()?;
        let created: CreateTransferResponse = Self::json(res, "create transfer")?;

        self.share_url
            .join(&created.transfer_key)
            .map_err(|err| TransferError::Api(format!("invalid transfer key: {err}")))
    }
}
