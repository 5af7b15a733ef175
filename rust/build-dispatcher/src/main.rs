use std::path::{Path, PathBuf};

use clap::Parser;
use kogito_build_packaging::{
    archive,
    build_type::{self, BinaryBuildType, RuntimeType},
    resource::{self, ResourceType},
};
use snafu::{ResultExt, Snafu};
use tracing_subscriber::EnvFilter;
use url::Url;

mod upload;

pub const APP_NAME: &str = "kogito-build-dispatcher";

#[derive(clap::Parser)]
#[clap(about, author)]
struct Args {
    /// Source to build: a local file or directory, a binary output directory,
    /// or a remote Git URL. Omit it to only prepare a binary build.
    resource: Option<String>,

    /// Target runtime of the service.
    #[clap(long, default_value_t = RuntimeType::Quarkus)]
    runtime: RuntimeType,

    /// Trigger a native build.
    #[clap(long)]
    native: bool,

    /// Namespace holding the BuildConfig.
    #[clap(long, env, required_unless_present = "output")]
    namespace: Option<String>,

    /// Name of the binary BuildConfig to trigger.
    #[clap(long, env, required_unless_present = "output")]
    build_config: Option<String>,

    /// Kubernetes API server base URL.
    #[clap(long, env, required_unless_present = "output")]
    api_server: Option<Url>,

    /// File containing a bearer token for the API server.
    #[clap(long, env)]
    token_file: Option<PathBuf>,

    /// Write the build payload to this path instead of uploading it.
    #[clap(long)]
    output: Option<PathBuf>,
}

#[derive(Snafu, Debug)]
enum Error {
    #[snafu(display("failed to classify resource"))]
    ClassifyResource { source: resource::Error },

    #[snafu(display("failed to infer the build runtime"))]
    InferRuntime { source: resource::Error },

    #[snafu(display("failed to infer the native build flag"))]
    InferNative { source: resource::Error },

    #[snafu(display("failed to derive the binary build type"))]
    DeriveBuildType { source: build_type::Error },

    #[snafu(display("failed to read source file {path:?}"))]
    ReadSourceFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to build the source archive"))]
    BuildArchive { source: archive::Error },

    #[snafu(display("failed to write the build payload to {path:?}"))]
    WritePayload {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to read token file {path:?}"))]
    ReadTokenFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("--namespace, --build-config and --api-server are required to upload"))]
    MissingUploadConfig,

    #[snafu(display("failed to upload the build payload"))]
    UploadPayload { source: upload::Error },
}

enum Payload {
    Archive(Vec<u8>),
    SingleFile { file_name: String, bytes: Vec<u8> },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("KOGITO_BUILD_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::info!(
        app = APP_NAME,
        version = env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let resource = args.resource.as_deref().unwrap_or_default();
    let resource_type = resource::classify(resource).context(ClassifyResourceSnafu)?;
    tracing::info!(%resource_type, "classified resource");

    let path = Path::new(resource);
    let runtime =
        resource::infer_runtime(args.runtime, resource_type, path).context(InferRuntimeSnafu)?;
    let native = resource::infer_native(args.native, resource_type, path).context(InferNativeSnafu)?;
    let binary_dir = (resource_type == ResourceType::LocalBinaryDirectory).then_some(path);
    let build_type = BinaryBuildType::derive(runtime, native, resource_type, binary_dir)
        .context(DeriveBuildTypeSnafu)?;
    tracing::info!(%build_type, %runtime, native, "resolved binary build type");

    let payload = match resource_type {
        ResourceType::GitFile | ResourceType::GitRepository => {
            tracing::info!(
                %resource_type,
                "git-sourced build, the cluster fetches the source itself, nothing to upload"
            );
            return Ok(());
        }
        ResourceType::Binary => {
            tracing::info!("no resource given, the binary artifacts arrive through a separate upload");
            return Ok(());
        }
        ResourceType::LocalFile => {
            let bytes = std::fs::read(path).context(ReadSourceFileSnafu { path })?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| resource.to_owned());
            Payload::SingleFile { file_name, bytes }
        }
        ResourceType::LocalDirectory | ResourceType::LocalBinaryDirectory => {
            Payload::Archive(archive::build_archive(path, build_type).context(BuildArchiveSnafu)?)
        }
    };

    if let Some(output) = &args.output {
        let bytes = match &payload {
            Payload::Archive(bytes) | Payload::SingleFile { bytes, .. } => bytes,
        };
        std::fs::write(output, bytes).context(WritePayloadSnafu { path: output })?;
        tracing::info!(path = %output.display(), "wrote build payload");
        return Ok(());
    }

    let (Some(api_server), Some(namespace), Some(build_config)) =
        (&args.api_server, &args.namespace, &args.build_config)
    else {
        return MissingUploadConfigSnafu.fail();
    };
    let token = match &args.token_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .context(ReadTokenFileSnafu { path })?,
        ),
        None => None,
    };
    let (content_type, as_file, bytes) = match payload {
        Payload::Archive(bytes) => ("application/gzip", None, bytes),
        Payload::SingleFile { file_name, bytes } => {
            ("application/octet-stream", Some(file_name), bytes)
        }
    };
    let endpoint =
        upload::build_trigger_endpoint(api_server, namespace, build_config, as_file.as_deref())
            .context(UploadPayloadSnafu)?;
    tracing::info!(%endpoint, payload.bytes = bytes.len(), "uploading build payload");

    let http = reqwest::Client::default();
    let build = upload::upload(&http, endpoint, token.as_deref(), content_type, bytes)
        .await
        .context(UploadPayloadSnafu)?;
    match build.metadata.name {
        Some(name) => tracing::info!(build = %name, "build triggered"),
        None => tracing::info!("build triggered"),
    }
    Ok(())
}
