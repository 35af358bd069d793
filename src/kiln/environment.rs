use crate::kiln::runner::Invocation;
use crate::kiln::KilnSettings;
use crate::plan::HostPrep;

/// Facts about the machine the build runs on.
#[derive(Debug)]
pub struct Environment {
    jobs: usize,
}

impl Environment {
    pub fn new(settings: &KilnSettings) -> Self {
        Environment {
            jobs: settings.jobs_override().unwrap_or_else(num_cpus::get),
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn prepare_invocations(&self, host: &HostPrep) -> anyhow::Result<Vec<Invocation>> {
        let mut invocations = vec![];

        if !host.refresh_command.is_empty() {
            invocations.push(Invocation::from_argv(&host.refresh_command)?);
        }

        let install = Invocation::from_argv(&host.install_command)?
            .args(host.packages.iter().cloned());
        invocations.push(install);

        Ok(invocations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kiln::KilnSettings;
    use std::path::PathBuf;

    fn host() -> HostPrep {
        HostPrep {
            packages: vec!["cmake".to_string(), "ninja-build".to_string()],
            refresh_command: vec!["apt-get".to_string(), "update".to_string()],
            install_command: vec![
                "apt-get".to_string(),
                "install".to_string(),
                "-y".to_string(),
            ],
        }
    }

    #[test]
    fn package_install_refreshes_first() {
        let settings = KilnSettings::with_root(PathBuf::from("/tmp/kiln"));
        let environment = Environment::new(&settings);

        let invocations = environment.prepare_invocations(&host()).unwrap();

        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0].command_line(), "apt-get update");
        assert_eq!(
            invocations[1].command_line(),
            "apt-get install -y cmake ninja-build"
        );
    }

    #[test]
    fn refresh_can_be_disabled_with_an_empty_command() {
        let settings = KilnSettings::with_root(PathBuf::from("/tmp/kiln"));
        let environment = Environment::new(&settings);

        let mut host = host();
        host.refresh_command.clear();

        let invocations = environment.prepare_invocations(&host).unwrap();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].program, "apt-get");
    }

    #[test]
    fn job_count_prefers_the_override() {
        let settings = KilnSettings::with_root(PathBuf::from("/tmp/kiln")).jobs(Some(3));
        assert_eq!(Environment::new(&settings).jobs(), 3);

        let settings = KilnSettings::with_root(PathBuf::from("/tmp/kiln"));
        assert_eq!(Environment::new(&settings).jobs(), num_cpus::get());
    }
}
