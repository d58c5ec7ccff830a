use clap::Args;
use serde::{Deserialize, Serialize};
use simple_error::{SimpleResult, bail};

#[derive(Args, Default, Deserialize, Serialize)]
pub struct SharedSettings {
    /// Number of threads to use. Defaults to all logical cpus detected.
    #[arg(long = "threads", global = true, value_name = "THREAD_COUNT")]
    #[serde(skip)]
    thread_count_option: Option<usize>,

    /// This value will be filled in by thread_count_option
    #[arg(hide = true, default_value_t = 0)]
    pub thread_count: usize,

    /// Overwrite an existing output directory
    #[arg(long, global = true)]
    pub clobber: bool,

    /// Turn on extra debug logging
    ///
    /// This option enables extra logging intended for debugging only. It is highly
    /// recommended (but not required) to set --threads to 1 when this is enabled.
    ///
    #[arg(long, global = true)]
    pub debug: bool,
}

pub fn validate_and_fix_shared_settings(
    mut settings: SharedSettings,
) -> SimpleResult<SharedSettings> {
    settings.thread_count = match settings.thread_count_option {
        Some(count) => {
            if count == 0 {
                bail!("--threads argument must be greater than 0");
            }
            count
        }
        None => num_cpus::get(),
    };

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_count() {
        let settings = SharedSettings {
            thread_count_option: Some(3),
            ..Default::default()
        };
        let settings = validate_and_fix_shared_settings(settings).unwrap();
        assert_eq!(settings.thread_count, 3);

        let settings = SharedSettings::default();
        let settings = validate_and_fix_shared_settings(settings).unwrap();
        assert!(settings.thread_count > 0);

        let settings = SharedSettings {
            thread_count_option: Some(0),
            ..Default::default()
        };
        assert!(validate_and_fix_shared_settings(settings).is_err());
    }
}
