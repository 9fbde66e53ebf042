//! Simple re-export of logging-related macros.
pub use color_eyre::eyre::eyre;
pub use tracing::{debug, error, info, span, trace, warn};

/// Install color_eyre as the global error handler.
#[tracing::instrument]
pub fn install_color_eyre() -> color_eyre::eyre::Result<()> {
    color_eyre::config::HookBuilder::default()
        .add_default_filters()
        .add_frame_filter(Box::new(|frames| {
            let filters = &[
                "tokio::",
                "tracing::",
                "color_eyre::",
                "reqwest::",
                "hyper::",
                "<core::",
            ];

            frames.retain(|frame| {
                !filters.iter().any(|f| {
                    let name = if let Some(name) = frame.name.as_ref() {
                        name.as_str()
                    } else {
                        return true;
                    };

                    name.starts_with(f)
                })
            });
        }))
        .install()?;

    Ok(())
}

/// Redact a bearer token for log output, keeping only a short prefix.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…")
}
