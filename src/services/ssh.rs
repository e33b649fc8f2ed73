use crate::constants::network::{EXEC_POLL_MS, KEEPALIVE_INTERVAL_SECS};
use crate::errors::{ToolError, ToolErrorKind};
use crate::services::config::{LogViewerConfig, SshCredentials};
use crate::services::logger::Logger;
use crate::services::remote::{ExecOutput, RemoteEntry, RemoteHost, RemoteStat};
use crate::services::security::SafeToken;
use async_trait::async_trait;
use ssh2::{ErrorCode, FileStat, Session};
use std::io::{Read, Seek, SeekFrom};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const MAX_EXEC_CAPTURE: usize = 64 * 1024;

// libssh2 session error codes.
const LIBSSH2_ERROR_SOCKET_SEND: i32 = -7;
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_SOCKET_DISCONNECT: i32 = -13;
const LIBSSH2_ERROR_SOCKET_RECV: i32 = -43;

// SFTP status codes.
const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_PERMISSION_DENIED: i32 = 3;

/// ssh2-backed [`RemoteHost`]. One session is opened lazily and reused; the
/// mutex around it serializes every operation on that session.
#[derive(Clone)]
pub struct SshTransport {
    logger: Logger,
    credentials: SshCredentials,
    connect_timeout: Duration,
    session: Arc<Mutex<Option<Session>>>,
}

impl SshTransport {
    pub fn new(logger: Logger, credentials: SshCredentials, config: &LogViewerConfig) -> Self {
        Self {
            logger: logger.child("ssh"),
            credentials,
            connect_timeout: config.connection_timeout(),
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Connects (if needed) and opens an SFTP channel.
    pub async fn probe(&self) -> Result<(), ToolError> {
        self.with_session(|session| {
            session.sftp().map_err(map_ssh_error)?;
            Ok(())
        })
        .await
    }

    async fn with_session<F, T>(&self, handler: F) -> Result<T, ToolError>
    where
        F: FnOnce(&Session) -> Result<T, ToolError> + Send + 'static,
        T: Send + 'static,
    {
        let slot = self.session.clone();
        let credentials = self.credentials.clone();
        let timeout = self.connect_timeout;
        let logger = self.logger.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = slot.lock().unwrap_or_else(|err| err.into_inner());
            if guard.is_none() {
                let session = connect_session(&credentials, timeout)?;
                logger.info(
                    "SSH session established",
                    Some(&serde_json::json!({"host": credentials.host, "port": credentials.port})),
                );
                *guard = Some(session);
            }
            let result = match guard.as_ref() {
                Some(session) => handler(session),
                None => Err(ToolError::internal("SSH session unavailable")),
            };
            if let Err(err) = &result {
                if matches!(
                    err.kind,
                    ToolErrorKind::ConnectionLost | ToolErrorKind::ConnectionTimeout
                ) {
                    logger.warn(
                        "Dropping SSH session after transport error",
                        Some(&serde_json::json!({"code": err.code, "error": err.message})),
                    );
                    *guard = None;
                }
            }
            result
        })
        .await
        .map_err(|_| ToolError::internal("SSH task failed"))?
    }
}

#[async_trait]
impl RemoteHost for SshTransport {
    async fn stat(&self, path: &str) -> Result<RemoteStat, ToolError> {
        let path = path.to_string();
        self.with_session(move |session| {
            let sftp = session.sftp().map_err(map_ssh_error)?;
            let stat = sftp.stat(Path::new(&path)).map_err(map_ssh_error)?;
            Ok(to_remote_stat(&stat))
        })
        .await
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, ToolError> {
        let path = path.to_string();
        self.with_session(move |session| {
            let sftp = session.sftp().map_err(map_ssh_error)?;
            let listing = sftp.readdir(Path::new(&path)).map_err(map_ssh_error)?;
            let mut entries = Vec::with_capacity(listing.len());
            for (entry_path, stat) in listing {
                let name = entry_path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or("")
                    .to_string();
                if name.is_empty() || name == "." || name == ".." {
                    continue;
                }
                entries.push(RemoteEntry {
                    name,
                    stat: to_remote_stat(&stat),
                });
            }
            Ok(entries)
        })
        .await
    }

    async fn read_range(&self, path: &str, offset: u64, len: u64) -> Result<Vec<u8>, ToolError> {
        let path = path.to_string();
        self.with_session(move |session| {
            let sftp = session.sftp().map_err(map_ssh_error)?;
            let mut file = sftp.open(Path::new(&path)).map_err(map_ssh_error)?;
            file.seek(SeekFrom::Start(offset))?;
            let mut out = Vec::with_capacity(len as usize);
            file.take(len).read_to_end(&mut out)?;
            Ok(out)
        })
        .await
    }

    async fn exec(&self, argv: &[SafeToken], timeout: Duration) -> Result<ExecOutput, ToolError> {
        if argv.is_empty() {
            return Err(ToolError::invalid_params("Command must not be empty"));
        }
        // SSH exec takes one string, so each token is single-quoted.
        let command = argv
            .iter()
            .map(|token| token.quoted())
            .collect::<Vec<_>>()
            .join(" ");
        self.with_session(move |session| exec_blocking(session, &command, timeout))
            .await
    }
}

fn to_remote_stat(stat: &FileStat) -> RemoteStat {
    RemoteStat {
        size: stat.size.unwrap_or(0),
        mtime: stat.mtime,
        permissions: stat.perm,
        is_dir: stat.is_dir(),
    }
}

fn connect_session(credentials: &SshCredentials, timeout: Duration) -> Result<Session, ToolError> {
    let addr = credentials
        .address()
        .to_socket_addrs()
        .map_err(|err| ToolError::invalid_params(format!("Invalid SSH host/port: {}", err)))?
        .next()
        .ok_or_else(|| ToolError::invalid_params("SSH host did not resolve"))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(|err| {
        if err.kind() == std::io::ErrorKind::TimedOut {
            ToolError::connection_timeout(format!("SSH connect timed out after {:?}", timeout))
        } else {
            ToolError::connection_lost(format!("Failed to connect SSH: {}", err))
        }
    })?;
    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();

    let mut session =
        Session::new().map_err(|_| ToolError::internal("Failed to create SSH session"))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
    session.handshake().map_err(map_ssh_error)?;

    if let Some(key) = credentials.private_key.as_ref() {
        session
            .userauth_pubkey_memory(
                &credentials.username,
                None,
                key,
                credentials.passphrase.as_deref(),
            )
            .map_err(map_ssh_error)?;
    } else if let Some(password) = credentials.password.as_ref() {
        session
            .userauth_password(&credentials.username, password)
            .map_err(map_ssh_error)?;
    }
    if !session.authenticated() {
        return Err(ToolError::permission_denied("SSH authentication failed"));
    }
    session.set_keepalive(true, KEEPALIVE_INTERVAL_SECS);
    Ok(session)
}

fn exec_blocking(session: &Session, command: &str, timeout: Duration) -> Result<ExecOutput, ToolError> {
    let mut channel = session.channel_session().map_err(map_ssh_error)?;
    channel.exec(command).map_err(map_ssh_error)?;
    session.set_blocking(false);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut stderr_stream = channel.stderr();
    let started = Instant::now();
    let mut timed_out = false;
    let mut failure: Option<ToolError> = None;

    loop {
        let mut progressed = false;
        let mut buf = [0u8; 8192];
        match channel.read(&mut buf) {
            Ok(n) if n > 0 => {
                capture(&mut stdout, &buf[..n]);
                progressed = true;
            }
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(err) => {
                failure = Some(ToolError::from(err));
                break;
            }
        }
        match stderr_stream.read(&mut buf) {
            Ok(n) if n > 0 => {
                capture(&mut stderr, &buf[..n]);
                progressed = true;
            }
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(err) => {
                failure = Some(ToolError::from(err));
                break;
            }
        }
        if channel.eof() {
            break;
        }
        if started.elapsed() > timeout {
            timed_out = true;
            break;
        }
        if !progressed {
            std::thread::sleep(Duration::from_millis(EXEC_POLL_MS));
        }
    }

    session.set_blocking(true);
    if timed_out {
        let _ = channel.close();
        return Err(ToolError::command_timeout(format!(
            "Remote command exceeded {:?}",
            timeout
        )));
    }
    if let Some(err) = failure {
        return Err(err);
    }
    let _ = channel.wait_close();
    let exit_code = channel.exit_status().unwrap_or(-1);
    Ok(ExecOutput {
        exit_code,
        stdout,
        stderr,
    })
}

fn capture(target: &mut Vec<u8>, chunk: &[u8]) {
    let room = MAX_EXEC_CAPTURE.saturating_sub(target.len());
    target.extend_from_slice(&chunk[..chunk.len().min(room)]);
}

pub fn map_ssh_error(err: ssh2::Error) -> ToolError {
    let message = err.message().to_string();
    match err.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => ToolError::not_found(format!("No such file: {}", message)),
        ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => {
            ToolError::permission_denied(format!("Permission denied: {}", message))
        }
        ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => {
            ToolError::connection_timeout(format!("SSH operation timed out: {}", message))
        }
        ErrorCode::Session(
            LIBSSH2_ERROR_SOCKET_SEND | LIBSSH2_ERROR_SOCKET_DISCONNECT | LIBSSH2_ERROR_SOCKET_RECV,
        ) => ToolError::connection_lost(format!("SSH connection lost: {}", message)),
        _ => {
            let io_err: std::io::Error = err.into();
            match io_err.kind() {
                std::io::ErrorKind::TimedOut => ToolError::connection_timeout("SSH operation timed out"),
                _ => ToolError::internal(format!("SSH error: {}", io_err)),
            }
        }
    }
}
