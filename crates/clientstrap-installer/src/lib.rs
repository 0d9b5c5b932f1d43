mod archive;
mod download;
mod fs_utils;
mod installs;
mod layout;
mod poller;
mod process;
mod settings;
mod wait;

pub use archive::extract_zip;
pub use download::{download_client, download_file};
pub use fs_utils::remove_file_if_exists;
pub use installs::read_riot_client_path;
pub use layout::{league_client_exe, league_client_lockfile, ClientLayout};
pub use poller::{
    InstallPoller, MissingStatus, PatchStatusExtractor, PollConfig, PollOutcome, PollPhase,
    ProductStateExtractor, ProgressExtractor, StatusSource, DEFAULT_POLL_INTERVAL,
};
pub use process::{count_running, matches_process_name, run_to_exit, spawn_detached, terminate_all};
pub use settings::{seed_files, write_base64_file, SeedFile};
pub use wait::{read_lockfile_settled, FileWaiter, DEFAULT_FILE_POLL_INTERVAL};
