/// Serve the current working directory over HTTP
#[derive(Debug, clap::Parser)]
#[command(version)]
pub(crate) struct Args {
    /// Host to serve on
    #[arg(long, value_name = "HOSTNAME_OR_IP", default_value = "127.0.0.1")]
    pub(crate) host: String,

    /// Port to serve on
    #[arg(short = 'P', long, value_name = "NUM", default_value_t = 8000)]
    pub(crate) port: u16,

    /// Don't open the served address in a browser
    #[arg(long)]
    pub(crate) no_open: bool,

    #[command(flatten)]
    pub(crate) color: colorchoice_clap::Color,

    #[command(flatten)]
    pub(crate) verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
