use binder_common::{Announcement, Result};

use crate::{listener::ListeningSocket, platform::Platform, private_dir::PrivateDirectory};

/// Announces the directory and both sockets, then closes stdout.
///
/// Closing stdout is the end-of-announcement signal: readers wait for EOF
/// instead of counting lines.
pub fn publish<P: Platform>(
    platform: &P,
    dir: &PrivateDirectory,
    data: &ListeningSocket,
    pass: &ListeningSocket,
) -> Result<Announcement> {
    let announcement = Announcement::new(dir.path())?;
    debug_assert_eq!(announcement.data_socket(), data.path());
    debug_assert_eq!(announcement.pass_socket(), pass.path());

    platform.publish(&announcement)?;
    tracing::info!(
        "Announced {:?}, {} and {} are ready",
        announcement.directory(),
        data.name(),
        pass.name()
    );
    Ok(announcement)
}
