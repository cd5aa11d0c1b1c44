//! Command-line templates for the install and upload steps
//!
//! A template is a program plus argument list in which `{package}`,
//! `{platform}` and `{token}` are substituted inside arguments and
//! `{archives}` expands to one argument per resolved archive.

use crate::core::error::DeployError;
use crate::core::traits::DeployStep;
use crate::security::token_manager::mask_token;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Placeholder pattern ({name})
const PLACEHOLDER_PATTERN: &str = r"\{([a-z_]+)\}";

/// Placeholder that expands to multiple arguments
const ARCHIVES_PLACEHOLDER: &str = "{archives}";

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"));

/// Program and argument template for one step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Default install command: `conda install --yes --use-local {package}`
    pub fn default_install() -> Self {
        Self::new("conda", &["install", "--yes", "--use-local", "{package}"])
    }

    /// Default upload command: `anaconda -t {token} upload {archives}`
    pub fn default_upload() -> Self {
        Self::new("anaconda", &["-t", "{token}", "upload", ARCHIVES_PLACEHOLDER])
    }

    /// Placeholder names referenced anywhere in the arguments
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .args
            .iter()
            .flat_map(|arg| PLACEHOLDER_REGEX.captures_iter(arg))
            .map(|cap| cap[1].to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Substitute placeholders and produce the argv to execute.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Config` when the program is empty, a placeholder is
    /// unknown, `{archives}` is embedded in a larger argument, or a placeholder
    /// has no value in `context`.
    pub fn render(
        &self,
        step: DeployStep,
        context: &TemplateContext<'_>,
    ) -> Result<RenderedCommand, DeployError> {
        if self.program.trim().is_empty() {
            return Err(DeployError::config(format!("{} command has no program", step)));
        }

        let mut args = Vec::with_capacity(self.args.len());
        let mut display_args = Vec::with_capacity(self.args.len());

        for arg in &self.args {
            if arg == ARCHIVES_PLACEHOLDER {
                let archives = context.archives.ok_or_else(|| {
                    DeployError::config(format!(
                        "{{archives}} is not available in the {} command",
                        step
                    ))
                })?;
                for archive in archives {
                    let path = archive.to_string_lossy().into_owned();
                    display_args.push(path.clone());
                    args.push(path);
                }
                continue;
            }

            let (real, display) = Self::substitute(arg, step, context)?;
            args.push(real);
            display_args.push(display);
        }

        Ok(RenderedCommand {
            step,
            program: self.program.clone(),
            args,
            display_args,
        })
    }

    /// Substitute scalar placeholders in one argument, returning the real value
    /// and the masked display value.
    fn substitute(
        arg: &str,
        step: DeployStep,
        context: &TemplateContext<'_>,
    ) -> Result<(String, String), DeployError> {
        let mut real = String::with_capacity(arg.len());
        let mut display = String::with_capacity(arg.len());
        let mut last = 0;

        for cap in PLACEHOLDER_REGEX.captures_iter(arg) {
            let whole = cap.get(0).expect("capture group 0 always matches");
            real.push_str(&arg[last..whole.start()]);
            display.push_str(&arg[last..whole.start()]);
            last = whole.end();

            match &cap[1] {
                "package" => {
                    real.push_str(context.package);
                    display.push_str(context.package);
                }
                "platform" => {
                    real.push_str(context.platform);
                    display.push_str(context.platform);
                }
                "token" => {
                    let token = context.token.ok_or_else(|| {
                        DeployError::config(format!(
                            "{{token}} is not available in the {} command",
                            step
                        ))
                    })?;
                    real.push_str(token.expose_secret());
                    display.push_str(&mask_token(token.expose_secret()));
                }
                "archives" => {
                    return Err(DeployError::config(format!(
                        "{{archives}} must be a whole argument in the {} command: {}",
                        step, arg
                    )));
                }
                other => {
                    return Err(DeployError::config(format!(
                        "unknown placeholder {{{}}} in the {} command",
                        other, step
                    )));
                }
            }
        }

        real.push_str(&arg[last..]);
        display.push_str(&arg[last..]);
        Ok((real, display))
    }
}

/// Values available for substitution
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub package: &'a str,
    pub platform: &'a str,
    pub token: Option<&'a SecretString>,
    pub archives: Option<&'a [PathBuf]>,
}

/// A fully substituted command, ready to execute
///
/// `Display` and `Debug` never reveal the token.
#[derive(Clone)]
pub struct RenderedCommand {
    step: DeployStep,
    program: String,
    args: Vec<String>,
    display_args: Vec<String>,
}

impl RenderedCommand {
    pub fn step(&self) -> DeployStep {
        self.step
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Real arguments, including the unmasked token
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Command line with the token masked, for logs and reports
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.display_args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl fmt::Debug for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedCommand")
            .field("step", &self.step)
            .field("command", &self.display())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "tok-abcdef-123456";

    fn context<'a>(
        token: Option<&'a SecretString>,
        archives: Option<&'a [PathBuf]>,
    ) -> TemplateContext<'a> {
        TemplateContext {
            package: "mypkg",
            platform: "linux-64",
            token,
            archives,
        }
    }

    #[test]
    fn test_default_install_renders_package() {
        let rendered = CommandTemplate::default_install()
            .render(DeployStep::Install, &context(None, None))
            .unwrap();

        assert_eq!(rendered.program(), "conda");
        assert_eq!(rendered.args(), ["install", "--yes", "--use-local", "mypkg"]);
        assert_eq!(rendered.step(), DeployStep::Install);
    }

    #[test]
    fn test_default_upload_expands_archives_and_masks_token() {
        let token = SecretString::new(TOKEN.into());
        let archives = vec![
            PathBuf::from("/bld/mypkg-1.0-linux-64.tar.bz2"),
            PathBuf::from("/bld/mypkg-1.1-linux-64.tar.bz2"),
        ];

        let rendered = CommandTemplate::default_upload()
            .render(DeployStep::Upload, &context(Some(&token), Some(&archives)))
            .unwrap();

        assert_eq!(
            rendered.args(),
            [
                "-t",
                TOKEN,
                "upload",
                "/bld/mypkg-1.0-linux-64.tar.bz2",
                "/bld/mypkg-1.1-linux-64.tar.bz2"
            ]
        );
        let shown = rendered.to_string();
        assert!(!shown.contains(TOKEN));
        assert!(shown.contains("tok...456"));
        assert!(!format!("{:?}", rendered).contains(TOKEN));
    }

    #[test]
    fn test_embedded_placeholders() {
        let template = CommandTemplate::new("conda", &["install", "{package}=*={platform}_*"]);
        let rendered = template
            .render(DeployStep::Install, &context(None, None))
            .unwrap();

        assert_eq!(rendered.args()[1], "mypkg=*=linux-64_*");
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        let template = CommandTemplate::new("conda", &["install", "{pkg}"]);
        let result = template.render(DeployStep::Install, &context(None, None));

        assert!(matches!(result, Err(DeployError::Config { .. })));
    }

    #[test]
    fn test_token_unavailable_in_install_step() {
        let template = CommandTemplate::new("conda", &["install", "--token={token}"]);
        let result = template.render(DeployStep::Install, &context(None, None));

        match result {
            Err(DeployError::Config { message }) => assert!(message.contains("install")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_embedded_archives_is_rejected() {
        let token = SecretString::new(TOKEN.into());
        let archives = vec![PathBuf::from("a.tar.bz2")];
        let template = CommandTemplate::new("anaconda", &["upload", "--file={archives}"]);

        let result = template.render(DeployStep::Upload, &context(Some(&token), Some(&archives)));
        assert!(matches!(result, Err(DeployError::Config { .. })));
    }

    #[test]
    fn test_empty_program_is_rejected() {
        let template = CommandTemplate::new("  ", &[]);
        let result = template.render(DeployStep::Install, &context(None, None));
        assert!(matches!(result, Err(DeployError::Config { .. })));
    }

    #[test]
    fn test_literal_braces_pass_through() {
        let template = CommandTemplate::new("conda", &["{}", "{Package}"]);
        let rendered = template
            .render(DeployStep::Install, &context(None, None))
            .unwrap();

        assert_eq!(rendered.args(), ["{}", "{Package}"]);
    }

    #[test]
    fn test_placeholders_listing() {
        assert_eq!(
            CommandTemplate::default_upload().placeholders(),
            vec!["archives".to_string(), "token".to_string()]
        );
    }
}
