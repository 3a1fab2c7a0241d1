use std::path::PathBuf;
use std::time::Instant;

use structopt::StructOpt;

use vidset_hub::client::HubClient;
use vidset_hub::err::HubError;
use vidset_hub::upload::upload_tree;
use vidset_hub::wire::{RepoRef, RepoType};
use vidset_prep::log::init_logging;

#[derive(Debug, StructOpt, Clone)]
#[structopt(name = "vidset-hub", about = "Upload a release folder to a Hub dataset repo")]
struct Opt {
    // User access token
    #[structopt(long, env = "HF_TOKEN", hide_env_values = true)]
    token: Option<String>,

    // namespace/name of the target repo
    #[structopt(long = "repo-id", alias = "repo_id")]
    repo_id: String,

    // Folder whose children get uploaded, one commit each
    #[structopt(long = "local-path", alias = "local_path")]
    local_path: PathBuf,

    // Folder inside the repo; empty means the root
    #[structopt(long = "remote-path", alias = "remote_path", default_value = "")]
    remote_path: String,

    #[structopt(long = "repo-type", default_value = "dataset")]
    repo_type: RepoType,

    #[structopt(long, default_value = "main")]
    revision: String,

    #[structopt(long, env = "HF_ENDPOINT", default_value = "https://huggingface.co")]
    endpoint: String,

    // Only list what would be uploaded
    #[structopt(long)]
    dry_run: bool,

    // Display Timing info
    #[structopt(long)]
    timing: bool,
}

#[tokio::main]
async fn main() -> Result<(), HubError> {
    init_logging("info");
    let opt = Opt::from_args();
    tracing::debug!("Uploading {:?} to {}", opt.local_path, opt.repo_id);

    let repo = RepoRef::new(opt.repo_id.clone(), opt.repo_type, opt.revision.clone())?;
    let token = match (opt.token.as_deref(), opt.dry_run) {
        (Some(token), _) => token,
        (None, true) => "",
        (None, false) => return Err(HubError::MissingToken),
    };
    let client = HubClient::new(&opt.endpoint, token)?;
    if !opt.dry_run {
        let me = client.whoami().await?;
        tracing::info!("Logged in to {} as {}", client.endpoint(), me.name);
    }

    let st = Instant::now();
    let report = upload_tree(&client, &repo, &opt.local_path, &opt.remote_path, opt.dry_run).await?;
    if opt.timing {
        tracing::info!("Upload took: {}ms", st.elapsed().as_millis());
    }

    if !report.is_clean() {
        for failure in report.failed.iter() {
            tracing::error!("failed: {} ({})", failure.item, failure.reason);
        }
        std::process::exit(1);
    }
    Ok(())
}
