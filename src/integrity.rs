//! Integrity hash of the local client files, sent as the "CRC hash" of the logon proof.
//!
//! The logon challenge response carries a 16 byte salt for this. The hash is
//! `SHA1(A | HMAC-SHA1(salt, files))` where `A` is the client public key.
//!
//! * [`login_integrity_check_windows`] for Windows x86.
//! * [`login_integrity_check_mac`] for Mac x86 and PowerPC.
//!
//! Different files are required for the different platforms.
//! Concatenating all the files into one buffer and using [`login_integrity_check_generic`]
//! gives the same result, which is what the session does with
//! [`ClientInfo::integrity_files`](crate::ClientInfo::integrity_files).
//! [`read_windows_files`] builds that buffer from a client directory.
//!
//! Servers that do not check the hash accept 20 zero bytes.
use crate::digest::{hmac_sha1, sha1, SHA1_LENGTH};
use crate::key::PUBLIC_KEY_LENGTH;
use std::path::Path;

/// Length of the checksum salt in the logon challenge response.
pub const INTEGRITY_SALT_LENGTH: u8 = 16;

/// Files hashed by Windows clients, after the executable itself.
pub const WINDOWS_LIBRARIES: [&str; 4] = ["fmod.dll", "ijl15.dll", "dbghelp.dll", "unicows.dll"];

/// Calculator for when you have appended all files into a single buffer.
pub fn login_integrity_check_generic(
    all_files: &[u8],
    checksum_salt: &[u8; INTEGRITY_SALT_LENGTH as usize],
    client_public_key: &[u8; PUBLIC_KEY_LENGTH as usize],
) -> [u8; SHA1_LENGTH] {
    let checksum = hmac_sha1(checksum_salt, &[all_files]);

    finalise(client_public_key, &checksum)
}

/// Calculator for Windows clients.
///
/// This requires the Windows version of these files:
///
/// * `WoW.exe`
/// * `fmod.dll`
/// * `ijl15.dll`
/// * `dbghelp.dll`
/// * `unicows.dll`
///
#[allow(clippy::too_many_arguments)]
pub fn login_integrity_check_windows(
    wow_exe: &[u8],
    fmod_dll: &[u8],
    ijl15_dll: &[u8],
    dbghelp_dll: &[u8],
    unicows_dll: &[u8],
    checksum_salt: &[u8; INTEGRITY_SALT_LENGTH as usize],
    client_public_key: &[u8; PUBLIC_KEY_LENGTH as usize],
) -> [u8; SHA1_LENGTH] {
    let checksum = hmac_sha1(
        checksum_salt,
        &[wow_exe, fmod_dll, ijl15_dll, dbghelp_dll, unicows_dll],
    );

    finalise(client_public_key, &checksum)
}

/// Calculator for Mac clients.
///
/// This requires the Mac version of these files:
///
/// * `MacOS/World of Warcraft`
/// * `Info.plist`
/// * `Resources/Main.nib/objects.xib`
/// * `Resources/wow.icns`
/// * `PkgInfo`
///
#[allow(clippy::too_many_arguments)]
pub fn login_integrity_check_mac(
    world_of_warcraft: &[u8],
    info_plist: &[u8],
    objects_xib: &[u8],
    wow_icns: &[u8],
    pkg_info: &[u8],
    checksum_salt: &[u8; INTEGRITY_SALT_LENGTH as usize],
    client_public_key: &[u8; PUBLIC_KEY_LENGTH as usize],
) -> [u8; SHA1_LENGTH] {
    let checksum = hmac_sha1(
        checksum_salt,
        &[world_of_warcraft, info_plist, objects_xib, wow_icns, pkg_info],
    );

    finalise(client_public_key, &checksum)
}

/// Reads `executable` and [`WINDOWS_LIBRARIES`] from `directory` into one buffer
/// for [`login_integrity_check_generic`].
///
/// # Errors
///
/// Has the same errors as [`std::fs::read`] for any of the files.
pub fn read_windows_files(directory: &Path, executable: &str) -> std::io::Result<Vec<u8>> {
    let mut all_files = std::fs::read(directory.join(executable))?;

    for library in WINDOWS_LIBRARIES {
        all_files.extend_from_slice(&std::fs::read(directory.join(library))?);
    }

    tracing::debug!(
        directory = %directory.display(),
        executable,
        bytes = all_files.len(),
        "read client files for integrity hash"
    );

    Ok(all_files)
}

fn finalise(seed: &[u8], checksum: &[u8]) -> [u8; SHA1_LENGTH] {
    sha1(&[seed, checksum])
}

#[cfg(test)]
mod test {
    use crate::integrity::{
        finalise, login_integrity_check_generic, login_integrity_check_windows,
        read_windows_files, WINDOWS_LIBRARIES,
    };

    const CHECKSUM_SALT: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

    fn client_public_key() -> [u8; 32] {
        let mut key = [0_u8; 32];
        for (i, k) in key.iter_mut().enumerate() {
            *k = 100 + i as u8;
        }
        key
    }

    #[test]
    fn ember() {
        const SALT: [u8; 32] = [
            0x88, 0xf7, 0x9e, 0xab, 0x68, 0xe7, 0x1e, 0xc9, 0xe2, 0xf4, 0xe4, 0x51, 0x66, 0x39,
            0xdc, 0x5d, 0x1d, 0x30, 0x0, 0xad, 0x15, 0xb0, 0xb4, 0xba, 0x1d, 0x58, 0xf7, 0x3b,
            0x58, 0xd1, 0xd2, 0x73,
        ];

        // HMAC-SHA1 of binary data and checksum salt
        const CHECKSUM_SALT_AND_DATA: [u8; 20] = [
            0xa5, 0x32, 0x7c, 0x48, 0xe4, 0xf7, 0x77, 0xb8, 0x4e, 0xa, 0xf0, 0x38, 0x68, 0x3f,
            0xfa, 0x33, 0x18, 0xdf, 0x12, 0xa8,
        ];

        const EXPECTED: [u8; 20] = [
            0x16, 0xea, 0x6, 0xf7, 0xd7, 0x75, 0xde, 0x25, 0xa2, 0xe, 0x7c, 0x54, 0x1d, 0xca, 0xa1,
            0xe9, 0xf7, 0x18, 0xa0, 0x34,
        ];
        assert_eq!(finalise(&SALT, &CHECKSUM_SALT_AND_DATA), EXPECTED);
    }

    #[test]
    fn generic_matches_known_value() {
        let all = b"WoW.exefmod.dllijl15.dlldbghelp.dllunicows.dll";
        let expected = hex::decode("417deaedcd4fca2280a13b917ed6ae2f5a59baf2").unwrap();

        let actual = login_integrity_check_generic(all, &CHECKSUM_SALT, &client_public_key());

        assert_eq!(actual.to_vec(), expected);
    }

    #[test]
    fn windows_is_generic_over_concatenation() {
        let windows = login_integrity_check_windows(
            b"WoW.exe",
            b"fmod.dll",
            b"ijl15.dll",
            b"dbghelp.dll",
            b"unicows.dll",
            &CHECKSUM_SALT,
            &client_public_key(),
        );
        let generic = login_integrity_check_generic(
            b"WoW.exefmod.dllijl15.dlldbghelp.dllunicows.dll",
            &CHECKSUM_SALT,
            &client_public_key(),
        );

        assert_eq!(windows, generic);
    }

    #[test]
    fn reads_files_in_hash_order() {
        let directory = std::env::temp_dir().join(format!("wow_session_integrity_{}", std::process::id()));
        std::fs::create_dir_all(&directory).unwrap();
        std::fs::write(directory.join("WoW.exe"), b"WoW.exe").unwrap();
        for library in WINDOWS_LIBRARIES {
            std::fs::write(directory.join(library), library.as_bytes()).unwrap();
        }

        let all = read_windows_files(&directory, "WoW.exe").unwrap();
        assert_eq!(all, b"WoW.exefmod.dllijl15.dlldbghelp.dllunicows.dll".to_vec());

        assert!(read_windows_files(&directory, "Missing.exe").is_err());

        std::fs::remove_dir_all(&directory).unwrap();
    }
}
