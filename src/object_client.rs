// src/object_client.rs
//
// Raw HTTP operations against one endpoint: streaming GET on the source
// side, multipart upload (S3) and block-blob upload (Azure) on the target
// side. S3 requests are signed with SigV4; Azure requests carry the
// pre-issued SAS query string from the endpoint descriptor.

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::{Client, Method, Response};
use std::pin::Pin;
use std::sync::Arc;
use url::Url;

use crate::constants::AZURE_API_VERSION;
use crate::endpoint::{EndpointContext, Provider};
use crate::error::TransferError;
use crate::http::{build_client, HttpClientConfig};
use crate::sigv4::{payload_sha256_hex, RequestSigner};

/// Streaming response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

pub struct ObjectClient {
    endpoint: Arc<EndpointContext>,
    client: Client,
    signer: RequestSigner,
}

impl ObjectClient {
    pub fn new(endpoint: Arc<EndpointContext>) -> Result<Self> {
        let config = HttpClientConfig::default().with_insecure_tls(endpoint.allow_insecure_tls);
        let client = build_client(&config)?;
        let signer = RequestSigner::new(&endpoint.access_key, &endpoint.secret_key, &endpoint.region);
        Ok(Self { endpoint, client, signer })
    }

    pub fn endpoint(&self) -> &EndpointContext {
        &self.endpoint
    }

    /// Streaming GET of one object. No Content-Length-sized buffer is
    /// allocated; the caller consumes the body chunk by chunk.
    pub async fn get_stream(&self, key: &str) -> Result<ByteStream> {
        let url = self.object_url(key, &[])?;
        let resp = self.send(Method::GET, url, &[], None).await?;
        let stream = resp
            .bytes_stream()
            .map_err(|e| anyhow!(e).context("reading source object stream"));
        Ok(Box::pin(stream))
    }

    // ----------------------------------------------------------------------
    // S3 multipart upload
    // ----------------------------------------------------------------------

    /// `POST /{bucket}/{key}?uploads` — returns the upload id.
    pub async fn initiate_multipart(&self, key: &str, content_type: Option<&str>) -> Result<String> {
        let url = self.object_url(key, &[("uploads", "")])?;
        let mut headers = Vec::new();
        if let Some(ct) = content_type {
            headers.push(("content-type".to_string(), ct.to_string()));
        }
        let resp = self.send(Method::POST, url, &headers, None).await?;
        let body = resp.text().await.context("reading InitiateMultipartUpload response")?;
        extract_xml_tag(&body, "UploadId")
            .ok_or_else(|| TransferError::MissingUploadId.into())
    }

    /// `PUT /{bucket}/{key}?partNumber=N&uploadId=ID` — returns the ETag.
    pub async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        chunk: Bytes,
    ) -> Result<String> {
        let url = self.object_url(
            key,
            &[("partNumber", &part_number.to_string()), ("uploadId", upload_id)],
        )?;
        let resp = self.send(Method::PUT, url, &[], Some(chunk)).await?;
        let etag = resp
            .headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if etag.is_empty() {
            anyhow::bail!("UploadPart returned empty ETag");
        }
        Ok(etag)
    }

    /// `POST /{bucket}/{key}?uploadId=ID` with the part list sorted by part
    /// number.
    pub async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[(i32, String)],
    ) -> Result<()> {
        let url = self.object_url(key, &[("uploadId", upload_id)])?;
        let body = build_complete_multipart_xml(parts);
        let headers = [("content-type".to_string(), "application/xml".to_string())];
        self.send(Method::POST, url, &headers, Some(Bytes::from(body)))
            .await
            .context("CompleteMultipartUpload failed")?;
        Ok(())
    }

    /// `DELETE /{bucket}/{key}?uploadId=ID` — releases storage held by an
    /// unfinished upload. Best-effort at call sites.
    pub async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<()> {
        let url = self.object_url(key, &[("uploadId", upload_id)])?;
        self.send(Method::DELETE, url, &[], None).await?;
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Azure block blob upload
    // ----------------------------------------------------------------------

    /// `PUT /{container}/{key}?comp=block&blockid=BASE64` — stages one
    /// uncommitted block.
    pub async fn stage_block(&self, key: &str, block_id: &str, chunk: Bytes) -> Result<()> {
        let url = self.object_url(key, &[("comp", "block"), ("blockid", block_id)])?;
        let headers = [
            ("x-ms-blob-type".to_string(), "BlockBlob".to_string()),
            ("x-ms-version".to_string(), AZURE_API_VERSION.to_string()),
        ];
        self.send(Method::PUT, url, &headers, Some(chunk)).await?;
        Ok(())
    }

    /// `PUT /{container}/{key}?comp=blocklist` — commits staged blocks in
    /// the given order.
    pub async fn commit_block_list(&self, key: &str, block_ids: &[String]) -> Result<()> {
        let url = self.object_url(key, &[("comp", "blocklist")])?;
        let body = build_block_list_xml(block_ids);
        let headers = [
            ("x-ms-version".to_string(), AZURE_API_VERSION.to_string()),
            ("content-type".to_string(), "application/xml".to_string()),
        ];
        self.send(Method::PUT, url, &headers, Some(Bytes::from(body)))
            .await
            .context("PutBlockList failed")?;
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Plumbing
    // ----------------------------------------------------------------------

    /// Path-style URL for one object, with query parameters and (for Azure)
    /// the SAS token appended.
    fn object_url(&self, key: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint.base_url)
            .with_context(|| format!("invalid endpoint URL {}", self.endpoint.base_url))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("endpoint URL cannot be a base: {}", self.endpoint.base_url))?;
            segments.pop_if_empty();
            segments.push(&self.endpoint.bucket);
            for segment in key.split('/') {
                segments.push(segment);
            }
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                if v.is_empty() {
                    pairs.append_key_only(k);
                } else {
                    pairs.append_pair(k, v);
                }
            }
        }
        if let Some(sas) = &self.endpoint.sas_token {
            let merged = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, sas),
                _ => sas.clone(),
            };
            url.set_query(Some(&merged));
        }
        Ok(url)
    }

    /// Issue one request, signing for S3 when credentials are present, and
    /// map non-2xx responses to `TransferError::HttpStatus`.
    async fn send(
        &self,
        method: Method,
        url: Url,
        extra_headers: &[(String, String)],
        body: Option<Bytes>,
    ) -> Result<Response> {
        let mut req = self.client.request(method.clone(), url.clone());

        if self.endpoint.provider == Provider::S3 {
            let payload_hash = match &body {
                Some(bytes) => payload_sha256_hex(bytes),
                None => payload_sha256_hex(&[]),
            };
            if let Some(signed) =
                self.signer.sign(method.as_str(), &url, extra_headers, &payload_hash)
            {
                req = req
                    .header("Host", &signed.host)
                    .header("x-amz-date", &signed.amz_date)
                    .header("x-amz-content-sha256", &signed.content_sha256)
                    .header("Authorization", &signed.authorization);
            }
        }
        for (name, value) in extra_headers {
            req = req.header(name, value);
        }
        if let Some(bytes) = body {
            req = req.body(bytes);
        }

        let resp = req.send().await.with_context(|| format!("{} {}", method, url))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransferError::HttpStatus(status.as_u16()))
                .with_context(|| format!("{} {}", method, url));
        }
        Ok(resp)
    }
}

/// First occurrence of `<tag>...</tag>` in an XML body. The handful of
/// fields we read back do not justify an XML parser dependency.
pub(crate) fn extract_xml_tag(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    let value = xml[start..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// `CompleteMultipartUpload` body; parts are listed in ascending part-number
/// order regardless of input order.
pub(crate) fn build_complete_multipart_xml(parts: &[(i32, String)]) -> String {
    let mut sorted: Vec<&(i32, String)> = parts.iter().collect();
    sorted.sort_by_key(|(number, _)| *number);

    let mut xml = String::from("<CompleteMultipartUpload>");
    for (number, etag) in sorted {
        xml.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>",
            number, etag
        ));
    }
    xml.push_str("</CompleteMultipartUpload>");
    xml
}

/// `PutBlockList` body; ids are listed in the order given, which is upload
/// order.
pub(crate) fn build_block_list_xml(block_ids: &[String]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList>");
    for id in block_ids {
        xml.push_str(&format!("<Latest>{}</Latest>", id));
    }
    xml.push_str("</BlockList>");
    xml
}
