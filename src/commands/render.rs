use flatpage::site::{Request, Site, Status};

use crate::RenderArgs;

pub async fn run(args: &RenderArgs) -> Result<(), anyhow::Error> {
    let site = Site::load(args.config_file.as_deref())?;
    let request = Request::new(args.path.clone())
        .with_mount_path(args.mount.clone())
        .with_base_url(args.base_url.clone());

    let response = tokio::task::spawn_blocking(move || site.handle(&request)).await??;
    if response.status == Status::NotFound {
        tracing::warn!(path = %args.path, "no page at this path, rendered the not-found page");
    }

    println!("{}", response.body);
    Ok(())
}
