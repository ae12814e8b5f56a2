use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "reel-agent", about = "Upload videos and track them until processing settles")]
pub struct Cli {
    /// Video files to upload
    pub files: Vec<PathBuf>,

    /// Job the uploads belong to
    #[arg(long, env = "REEL_JOB_ID")]
    pub job_id: Option<String>,

    /// Title for every upload (default: file name)
    #[arg(long)]
    pub title: Option<String>,

    /// Resubmit uploads that failed in a previous session
    #[arg(long)]
    pub retry_failed: bool,

    /// Submit and exit without waiting for processing to finish
    #[arg(long)]
    pub no_wait: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_files_and_flags() {
        let cli = Cli::try_parse_from(["reel-agent", "a.mp4", "b.webm", "--job-id", "job9", "--no-wait"]).unwrap();

        assert_eq!(cli.files, vec![PathBuf::from("a.mp4"), PathBuf::from("b.webm")]);
        assert_eq!(cli.job_id.as_deref(), Some("job9"));
        assert!(cli.no_wait);
        assert!(!cli.retry_failed);
        assert!(cli.title.is_none());
    }

    #[test]
    fn test_parse_without_files() {
        let cli = Cli::try_parse_from(["reel-agent", "--retry-failed"]).unwrap();
        assert!(cli.files.is_empty());
        assert!(cli.retry_failed);
    }
}
