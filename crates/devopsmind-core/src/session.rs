use crate::config::Config;
use crate::error::Result;
use crate::paths::Layout;
use crate::profile::{self, PlayerProfile};
use tracing::debug;

/// Per-command context: resolved once at startup and passed down instead of
/// being re-read from disk by each component.
#[derive(Debug, Clone)]
pub struct Session {
    pub layout: Layout,
    pub config: Config,
    pub active_name: String,
    pub profile: PlayerProfile,
    /// True when the active profile had to be rebuilt on load.
    pub rebuilt: bool,
    setup_completed: bool,
}

impl Session {
    pub fn open(layout: Layout) -> Result<Self> {
        let config = Config::load(&layout)?;
        Self::with_config(layout, config)
    }

    pub fn with_config(layout: Layout, config: Config) -> Result<Self> {
        let active_name = profile::active_name(&layout);
        let (profile, rebuilt) = PlayerProfile::load_or_rebuild(&layout, &active_name)?;
        if !layout.active_profile_file().exists() {
            profile::set_active(&layout, &active_name)?;
        }
        debug!(profile = %active_name, data_dir = %layout.data_dir.display(), "session opened");
        Ok(Self {
            layout,
            config,
            active_name,
            profile,
            rebuilt,
            setup_completed: false,
        })
    }

    pub fn save_profile(&self) -> Result<()> {
        self.profile.save(&self.layout, &self.active_name)
    }

    /// Make `name` the active profile for the rest of this command.
    pub fn switch_to(&mut self, name: &str, profile: PlayerProfile) -> Result<()> {
        profile::set_active(&self.layout, name)?;
        self.active_name = name.to_string();
        self.profile = profile;
        self.setup_completed = false;
        Ok(())
    }

    /// Reports, at most once per command, that the active profile lacks a
    /// gamer tag or email.
    pub fn needs_setup(&mut self) -> bool {
        if self.setup_completed {
            return false;
        }
        self.setup_completed = true;
        self.profile.player.gamer.trim().is_empty() || self.profile.player.email.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_bootstraps_default_profile() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        let session = Session::with_config(layout.clone(), Config::default()).unwrap();
        assert_eq!(session.active_name, "default");
        assert!(layout.profile_path("default").exists());
        assert_eq!(profile::active_name(&layout), "default");
    }

    #[test]
    fn open_heals_undecodable_active_profile() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        std::fs::create_dir_all(layout.profiles_dir()).unwrap();
        std::fs::write(layout.profile_path("default"), b"\xff\xfe\x00\x80").unwrap();
        let session = Session::with_config(layout, Config::default()).unwrap();
        assert!(session.rebuilt);
        assert_eq!(session.profile.player.xp, 0);
    }

    #[test]
    fn needs_setup_reports_once() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::with_config(Layout::under(dir.path()), Config::default()).unwrap();
        assert!(session.needs_setup());
        assert!(!session.needs_setup());
    }

    #[test]
    fn complete_profile_needs_no_setup() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        PlayerProfile::create(&layout, "ops", "opsy", "ops@example.com").unwrap();
        profile::set_active(&layout, "ops").unwrap();
        let mut session = Session::with_config(layout, Config::default()).unwrap();
        assert_eq!(session.profile.player.gamer, "opsy");
        assert!(!session.needs_setup());
    }

    #[test]
    fn switch_updates_selector() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        let mut session = Session::with_config(layout.clone(), Config::default()).unwrap();
        let other = PlayerProfile::create(&layout, "second", "s", "").unwrap();
        session.switch_to("second", other).unwrap();
        assert_eq!(profile::active_name(&layout), "second");
        assert_eq!(session.profile.player.gamer, "s");
    }
}
