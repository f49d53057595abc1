use anyhow::Context as _;

use crate::args;
use crate::error::Result;

pub(crate) fn run(args: &args::Args) -> Result<()> {
    let source = std::env::current_dir().context("Failed to read the current directory")?;

    let mut server = servedir::ServerBuilder::new(&source);
    server.hostname(&args.host);
    server.port(args.port);
    let server = server.build();

    server
        .bind()
        .with_context(|| format!("Failed to bind http://{}/", server.addr()))?;

    let url = format!("http://{}/", server.addr());
    println!("Serving {} at {url}", source.display());
    println!("Hit CTRL-C to stop the server");

    if !args.no_open {
        open_browser(&url)?;
    }

    Ok(server.serve()?)
}

fn open_browser(url: &str) -> Result<()> {
    // an explicit `BROWSER` selection wins over the platform launcher; detached
    // so a browser that stays in the foreground can't hold up serving
    let result = match std::env::var("BROWSER") {
        Ok(browser) if !browser.is_empty() => open::with_detached(url, browser),
        _ => open::that_detached(url),
    };
    match result {
        Ok(()) => log::info!("Please check your browser!"),
        Err(why) => log::debug!("Failed to open a browser: {why}"),
    }
    Ok(())
}
