use std::path::Path;

use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, RequestBuilder, Response};
use tokio_util::io::ReaderStream;
use url::Url;

use crate::err::HubError;
use crate::wire::{
    commit_ndjson, CommitOp, CommitResponse, LfsAction, LfsBatchRequest, LfsBatchResponse,
    LfsObject, PreuploadFile, PreuploadRequest, PreuploadResponse, PreuploadResponseFile,
    RepoRef, WhoAmI,
};
use crate::PREUPLOAD_CHUNK;

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";

// Hub HTTP API, authenticated with a user access token
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl HubClient {
    pub fn new(endpoint: &str, token: &str) -> Result<Self, HubError> {
        // join() drops the last segment unless the base ends with a slash
        let endpoint = if endpoint.ends_with('/') {
            Url::parse(endpoint)?
        } else {
            Url::parse(&format!("{endpoint}/"))?
        };
        let http = reqwest::Client::builder()
            .user_agent(concat!("vidset-hub/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            token: token.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, path: &str) -> Result<Url, HubError> {
        Ok(self.endpoint.join(path)?)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
    }

    /// Validates the token; the name of the account it belongs to.
    pub async fn whoami(&self) -> Result<WhoAmI, HubError> {
        let url = self.url("api/whoami-v2")?;
        let resp = check(self.authed(self.http.get(url)).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Ask the hub which files go through LFS and which can be committed inline.
    pub async fn preupload(
        &self,
        repo: &RepoRef,
        files: &[PreuploadFile],
    ) -> Result<Vec<PreuploadResponseFile>, HubError> {
        let url = self.url(&repo.api_path("preupload"))?;
        let mut modes = Vec::with_capacity(files.len());
        for chunk in files.chunks(PREUPLOAD_CHUNK) {
            let req = self
                .authed(self.http.post(url.clone()))
                .json(&PreuploadRequest { files: chunk });
            let resp: PreuploadResponse = check(req.send().await?).await?.json().await?;
            modes.extend(resp.files);
        }
        Ok(modes)
    }

    pub async fn lfs_batch(
        &self,
        repo: &RepoRef,
        objects: &[LfsObject],
    ) -> Result<LfsBatchResponse, HubError> {
        let url = self.url(&repo.lfs_batch_path())?;
        let body = serde_json::to_vec(&LfsBatchRequest::upload(objects))?;
        let req = self
            .authed(self.http.post(url))
            .header(ACCEPT, LFS_CONTENT_TYPE)
            .header(CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(body);
        Ok(check(req.send().await?).await?.json().await?)
    }

    // The href is presigned storage; it must not see the hub token.
    pub async fn lfs_upload(
        &self,
        action: &LfsAction,
        object: &LfsObject,
        path: &Path,
    ) -> Result<(), HubError> {
        if action.header.contains_key("chunk_size") {
            return Err(HubError::Lfs {
                oid: object.oid.clone(),
                reason: String::from("multipart transfer is not supported"),
            });
        }
        let file = tokio::fs::File::open(path).await?;
        let mut req = self.http.put(action.href.as_str());
        for (k, v) in action.header.iter() {
            req = req.header(k.as_str(), v.as_str());
        }
        let req = req
            .header(CONTENT_LENGTH, object.size)
            .body(Body::wrap_stream(ReaderStream::new(file)));
        check(req.send().await?).await?;
        Ok(())
    }

    pub async fn lfs_verify(&self, action: &LfsAction, object: &LfsObject) -> Result<(), HubError> {
        let mut req = self.authed(self.http.post(action.href.as_str()));
        for (k, v) in action.header.iter() {
            req = req.header(k.as_str(), v.as_str());
        }
        check(req.json(object).send().await?).await?;
        Ok(())
    }

    pub async fn commit(
        &self,
        repo: &RepoRef,
        summary: &str,
        ops: &[CommitOp],
    ) -> Result<CommitResponse, HubError> {
        let url = self.url(&repo.api_path("commit"))?;
        let body = commit_ndjson(summary, "", ops)?;
        let req = self
            .authed(self.http.post(url))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let resp = check(req.send().await?).await?;
        // older hubs answer with an empty body
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(CommitResponse::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn check(resp: Response) -> Result<Response, HubError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(HubError::Status {
        status: status.as_u16(),
        url,
        body,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn endpoint_gets_trailing_slash() {
        let client = HubClient::new("http://127.0.0.1:9/hub", "t").unwrap();
        assert_eq!(client.endpoint().as_str(), "http://127.0.0.1:9/hub/");
        let repo = RepoRef::dataset("org/ds").unwrap();
        assert_eq!(
            client.url(&repo.api_path("commit")).unwrap().as_str(),
            "http://127.0.0.1:9/hub/api/datasets/org/ds/commit/main"
        );
    }

    #[test]
    fn bad_endpoint() {
        assert!(matches!(
            HubClient::new("not a url", "t"),
            Err(HubError::UrlErr(_))
        ));
    }

    #[tokio::test]
    async fn multipart_is_refused() {
        let client = HubClient::new("http://127.0.0.1:9", "t").unwrap();
        let action = LfsAction {
            href: String::from("http://127.0.0.1:9/upload"),
            header: [(String::from("chunk_size"), String::from("5"))]
                .into_iter()
                .collect(),
        };
        let object = LfsObject {
            oid: String::from("aa"),
            size: 10,
        };
        assert!(matches!(
            client.lfs_upload(&action, &object, Path::new("/nonexistent")).await,
            Err(HubError::Lfs { .. })
        ));
    }
}
