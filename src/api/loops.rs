use crate::error::PipelineError;
use std::path::Path;
use tokio::process::Command;

/// External loop-generation collaborator, driven by a configured command
/// template. Placeholders: `{image_path}`, `{output_path}`, `{prompt}`,
/// `{duration}`, `{fps}`.
pub struct LoopCommand {
    pub template: String,
}

impl LoopCommand {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub async fn generate_loop_video(
        &self,
        image_path: &Path,
        output_path: &Path,
        prompt: &str,
        duration_seconds: u32,
        fps: u32,
    ) -> Result<(), PipelineError> {
        let rendered = self
            .template
            .replace("{image_path}", &image_path.display().to_string())
            .replace("{output_path}", &output_path.display().to_string())
            .replace("{prompt}", prompt)
            .replace("{duration}", &duration_seconds.to_string())
            .replace("{fps}", &fps.to_string());

        let argv = split_command(&rendered)
            .ok_or_else(|| PipelineError::generation("unbalanced quotes in loop command"))?;
        if argv.is_empty() {
            return Err(PipelineError::generation("loop command template is empty"));
        }

        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .status()
            .await
            .map_err(|e| PipelineError::generation(format!("loop command failed to start: {e}")))?;
        if !status.success() {
            return Err(PipelineError::generation(format!(
                "loop command exited with {status}"
            )));
        }
        Ok(())
    }
}

/// Splits a command line on whitespace, honoring single and double
/// quotes. Returns None on unbalanced quoting.
pub fn split_command(line: &str) -> Option<Vec<String>> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                } else {
                    current.push(ch);
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        argv.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }

    if quote.is_some() {
        return None;
    }
    if in_word {
        argv.push(current);
    }
    Some(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn splits_plain_words() {
        assert_eq!(
            split_command("genloop --fps 30 out.mp4").unwrap(),
            vec!["genloop", "--fps", "30", "out.mp4"]
        );
    }

    #[test]
    fn quotes_keep_spaces_together() {
        assert_eq!(
            split_command(r#"genloop --prompt "soft rain at night" 'out dir/loop.mp4'"#).unwrap(),
            vec!["genloop", "--prompt", "soft rain at night", "out dir/loop.mp4"]
        );
    }

    #[test]
    fn unbalanced_quote_is_rejected() {
        assert!(split_command("genloop 'oops").is_none());
    }

    #[test]
    fn template_placeholders_are_substituted() {
        let cmd = LoopCommand::new("genloop -i {image_path} -o {output_path} -d {duration} -r {fps} -p '{prompt}'");
        let rendered = cmd
            .template
            .replace("{image_path}", &PathBuf::from("v.png").display().to_string())
            .replace("{output_path}", "loop.mp4")
            .replace("{prompt}", "calm fireplace")
            .replace("{duration}", "5")
            .replace("{fps}", "30");
        let argv = split_command(&rendered).unwrap();
        assert_eq!(
            argv,
            vec!["genloop", "-i", "v.png", "-o", "loop.mp4", "-d", "5", "-r", "30", "-p", "calm fireplace"]
        );
    }
}
