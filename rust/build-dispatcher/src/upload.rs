//! Binary upload against the cluster's build trigger endpoint.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use url::Url;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("failed to construct the build trigger endpoint"))]
    BuildEndpoint { source: url::ParseError },

    #[snafu(display("failed to execute the upload request"))]
    HttpRequest { source: reqwest::Error },

    #[snafu(display("upload was rejected: {text}"))]
    HttpErrorResponse { status: StatusCode, text: String },

    #[snafu(display("upload was rejected with undecodable text"))]
    HttpErrorResponseUndecodableText {
        status: StatusCode,
        encoding_error: reqwest::Error,
    },

    #[snafu(display("failed to parse the triggered build"))]
    ParseBuild { source: reqwest::Error },
}

/// Metadata of the build the cluster started for the upload.
#[derive(Deserialize)]
pub struct TriggeredBuild {
    #[serde(default)]
    pub metadata: BuildMetadata,
}

#[derive(Default, Deserialize)]
pub struct BuildMetadata {
    pub name: Option<String>,
}

/// Binary build trigger endpoint of an OpenShift `BuildConfig`.
///
/// `as_file` uploads the body as a single named file instead of unpacking it
/// as an archive.
pub fn build_trigger_endpoint(
    api_server: &Url,
    namespace: &str,
    build_config: &str,
    as_file: Option<&str>,
) -> Result<Url, Error> {
    let mut url = Url::parse(&format!(
        "{}/apis/build.openshift.io/v1/namespaces/{namespace}/buildconfigs/{build_config}/instantiatebinary",
        api_server.as_str().trim_end_matches('/'),
    ))
    .context(BuildEndpointSnafu)?;
    if let Some(file_name) = as_file {
        url.query_pairs_mut().append_pair("asFile", file_name);
    }
    Ok(url)
}

/// Uploads the payload and returns the name of the build the cluster started.
pub async fn upload(
    http: &reqwest::Client,
    endpoint: Url,
    token: Option<&str>,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<TriggeredBuild, Error> {
    let mut request: RequestBuilder = http
        .post(endpoint)
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .body(body);
    if let Some(token) = token {
        request = request.bearer_auth(token.trim());
    }
    let response = request.send().await.context(HttpRequestSnafu)?;
    let response = get_non_error_response(response).await?;
    response.json().await.context(ParseBuildSnafu)
}

/// Checks a response for client or server errors, pulling the body text into
/// the error because the plain status gives no context on why the build was
/// rejected.
async fn get_non_error_response(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        match response.text().await {
            Ok(text) => HttpErrorResponseSnafu { status, text }.fail(),
            Err(encoding_error) => HttpErrorResponseUndecodableTextSnafu {
                status,
                encoding_error,
            }
            .fail(),
        }
    } else {
        Ok(response)
    }
}
