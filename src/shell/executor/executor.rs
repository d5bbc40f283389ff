use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use log::debug;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::shell::parser::Parser;
use crate::utils::path::resolve;

/// Runs parsed command segments as child processes, wiring up redirections
/// and, for pipelines, the connecting pipe.
///
/// Every descriptor the executor opens is owned by exactly one process at a
/// time: the parent opens redirection targets, the child duplicates them onto
/// its standard slots, and both sides retire their copies immediately after.
pub struct Executor {
    root: PathBuf,
}

impl Executor {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Runs one segment with no pipe: `prog [args...] [< in] [> out]`.
    ///
    /// A blank or argument-free segment is a no-op. Redirection targets are
    /// opened before the fork, so a bad path never leaves a half-started
    /// child behind. Returns the child's exit code.
    pub fn run_single(&self, segment_text: &str) -> io::Result<i32> {
        let text = segment_text.trim();
        if text.is_empty() {
            return Ok(0);
        }

        let segment = Parser::new(text).parse_segment();
        if segment.is_empty() {
            return Ok(0);
        }

        let program = resolve(&self.root, &segment.argv[0])?;
        let argv = build_argv(&program, &segment.argv)?;

        let stdin_file = match segment.stdin_path.as_deref() {
            Some(token) => Some(File::open(resolve(&self.root, token)?)?),
            None => None,
        };
        let stdout_file = match segment.stdout_path.as_deref() {
            Some(token) => Some(create_output(&resolve(&self.root, token)?)?),
            None => None,
        };

        debug!("running {:?}", segment.argv);
        match unsafe { unistd::fork() }.map_err(nix_to_io)? {
            ForkResult::Child => exec_single_child(&program, &argv, stdin_file, stdout_file),
            ForkResult::Parent { child } => {
                // The child holds duplicates by now; the parent's copies are
                // retired before it blocks.
                drop(stdin_file);
                drop(stdout_file);
                wait_for(child)
            }
        }
    }

    /// Runs `left | right`, exactly two segments around one pipe.
    ///
    /// The pipe supplies the left segment's output and the right segment's
    /// input, so `>` on the left and `<` on the right are rejected before any
    /// descriptor or process is created. Returns the right child's exit code.
    pub fn run_pipeline(&self, left_text: &str, right_text: &str) -> io::Result<i32> {
        let (left_text, right_text) = (left_text.trim(), right_text.trim());
        if left_text.is_empty() || right_text.is_empty() {
            return Err(invalid("a pipeline needs a command on both sides of the pipe"));
        }

        let left = Parser::new(left_text).parse_segment();
        let right = Parser::new(right_text).parse_segment();
        if left.is_empty() || right.is_empty() {
            return Err(invalid("a pipeline needs a command on both sides of the pipe"));
        }
        if left.stdout_path.is_some() {
            return Err(invalid(
                "cannot redirect the output of the left side of a pipe",
            ));
        }
        if right.stdin_path.is_some() {
            return Err(invalid(
                "cannot redirect the input of the right side of a pipe",
            ));
        }

        let stdin_file = match left.stdin_path.as_deref() {
            Some(token) => Some(File::open(resolve(&self.root, token)?)?),
            None => None,
        };

        let left_program = resolve(&self.root, &left.argv[0])?;
        let right_program = resolve(&self.root, &right.argv[0])?;
        let left_argv = build_argv(&left_program, &left.argv)?;
        let right_argv = build_argv(&right_program, &right.argv)?;

        let (pipe_read, pipe_write) = unistd::pipe().map_err(nix_to_io)?;

        debug!("running {:?} | {:?}", left.argv, right.argv);
        let left_pid = match unsafe { unistd::fork() }.map_err(nix_to_io)? {
            ForkResult::Child => {
                exec_pipe_left_child(&left_program, &left_argv, stdin_file, pipe_read, pipe_write)
            }
            ForkResult::Parent { child } => child,
        };
        // Ownership of the input descriptor has moved to the left child.
        drop(stdin_file);

        let right_pid = match unsafe { unistd::fork() } {
            Ok(ForkResult::Child) => exec_pipe_right_child(
                &self.root,
                &right_program,
                &right_argv,
                right.stdout_path.as_deref(),
                pipe_read,
                pipe_write,
            ),
            Ok(ForkResult::Parent { child }) => child,
            Err(err) => {
                // The left child is already running; give it end-of-stream
                // and reap it before reporting.
                drop(pipe_read);
                drop(pipe_write);
                let _ = wait_for(left_pid);
                return Err(nix_to_io(err));
            }
        };

        // The parent never touches the pipe. Keeping the write end open here
        // would stop the right child from ever seeing end-of-stream.
        drop(pipe_read);
        drop(pipe_write);

        let left_code = wait_for(left_pid)?;
        let right_code = wait_for(right_pid)?;
        debug!("pipeline finished: left={}, right={}", left_code, right_code);
        Ok(right_code)
    }
}

/// Installs an ignore disposition for SIGINT in the shell itself, so an
/// interrupted child does not take the prompt loop down with it. Children
/// restore the default before exec.
pub fn ignore_interrupts() -> io::Result<()> {
    unsafe { signal::signal(Signal::SIGINT, SigHandler::SigIgn) }.map_err(nix_to_io)?;
    Ok(())
}

fn restore_default_interrupts() -> io::Result<()> {
    unsafe { signal::signal(Signal::SIGINT, SigHandler::SigDfl) }.map_err(nix_to_io)?;
    Ok(())
}

/// The resolved program path becomes argv[0]; the remaining words follow it.
fn build_argv(program: &Path, words: &[String]) -> io::Result<Vec<CString>> {
    let mut argv = Vec::with_capacity(words.len());
    argv.push(CString::new(program.as_os_str().as_bytes()).map_err(|e| invalid(&e.to_string()))?);
    for word in &words[1..] {
        argv.push(CString::new(word.as_str()).map_err(|e| invalid(&e.to_string()))?);
    }
    Ok(argv)
}

fn create_output(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Duplicates an opened redirection target onto a standard slot and retires
/// the scratch descriptor.
fn attach(file: File, slot: RawFd) -> io::Result<()> {
    unistd::dup2(file.as_raw_fd(), slot).map_err(nix_to_io)?;
    Ok(())
}

fn wire_single(stdin_file: Option<File>, stdout_file: Option<File>) -> io::Result<()> {
    restore_default_interrupts()?;
    if let Some(file) = stdin_file {
        attach(file, libc::STDIN_FILENO)?;
    }
    if let Some(file) = stdout_file {
        attach(file, libc::STDOUT_FILENO)?;
    }
    Ok(())
}

fn wire_pipe_left(
    stdin_file: Option<File>,
    pipe_read: OwnedFd,
    pipe_write: OwnedFd,
) -> io::Result<()> {
    restore_default_interrupts()?;
    if let Some(file) = stdin_file {
        attach(file, libc::STDIN_FILENO)?;
    }
    unistd::dup2(pipe_write.as_raw_fd(), libc::STDOUT_FILENO).map_err(nix_to_io)?;
    // Neither raw endpoint may survive in this child under its original
    // number, or the sibling never sees end-of-stream.
    drop(pipe_write);
    drop(pipe_read);
    Ok(())
}

fn wire_pipe_right(
    root: &Path,
    stdout_token: Option<&str>,
    pipe_read: OwnedFd,
    pipe_write: OwnedFd,
) -> io::Result<()> {
    restore_default_interrupts()?;
    unistd::dup2(pipe_read.as_raw_fd(), libc::STDIN_FILENO).map_err(nix_to_io)?;
    drop(pipe_read);
    drop(pipe_write);
    if let Some(token) = stdout_token {
        let file = create_output(&resolve(root, token)?)?;
        attach(file, libc::STDOUT_FILENO)?;
    }
    Ok(())
}

/// Replaces the child's image. Only ever returns an error.
fn exec_image(argv: &[CString]) -> io::Error {
    match unistd::execv(&argv[0], argv) {
        Ok(never) => match never {},
        Err(err) => nix_to_io(err),
    }
}

fn exec_single_child(
    program: &Path,
    argv: &[CString],
    stdin_file: Option<File>,
    stdout_file: Option<File>,
) -> ! {
    let err = match wire_single(stdin_file, stdout_file) {
        Ok(()) => exec_image(argv),
        Err(err) => err,
    };
    child_bailout(program, &err)
}

fn exec_pipe_left_child(
    program: &Path,
    argv: &[CString],
    stdin_file: Option<File>,
    pipe_read: OwnedFd,
    pipe_write: OwnedFd,
) -> ! {
    let err = match wire_pipe_left(stdin_file, pipe_read, pipe_write) {
        Ok(()) => exec_image(argv),
        Err(err) => err,
    };
    child_bailout(program, &err)
}

fn exec_pipe_right_child(
    root: &Path,
    program: &Path,
    argv: &[CString],
    stdout_token: Option<&str>,
    pipe_read: OwnedFd,
    pipe_write: OwnedFd,
) -> ! {
    let err = match wire_pipe_right(root, stdout_token, pipe_read, pipe_write) {
        Ok(()) => exec_image(argv),
        Err(err) => err,
    };
    child_bailout(program, &err)
}

/// A failed child reports on its own stderr and terminates immediately; it
/// must never fall through into the dispatcher loop.
fn child_bailout(program: &Path, err: &io::Error) -> ! {
    let _ = writeln!(io::stderr(), "nutsh: {}: {}", program.display(), err);
    unsafe { libc::_exit(127) }
}

fn wait_for(pid: Pid) -> io::Result<i32> {
    loop {
        match waitpid(pid, None).map_err(nix_to_io)? {
            WaitStatus::Exited(_, code) => return Ok(code),
            WaitStatus::Signaled(_, sig, _) => return Ok(128 + sig as i32),
            status => debug!("child {} reported {:?}", pid, status),
        }
    }
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

fn nix_to_io(err: nix::Error) -> io::Error {
    io::Error::from_raw_os_error(err as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Builds a throwaway command root holding symlinks to real binaries, so
    /// bare names resolve the way they would on the fixed namespace.
    #[allow(clippy::unwrap_used)]
    fn scratch_root(tag: &str, programs: &[&str]) -> PathBuf {
        let root = std::env::temp_dir().join(format!("nutsh-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        for program in programs {
            std::os::unix::fs::symlink(format!("/bin/{}", program), root.join(program)).unwrap();
        }
        root
    }

    fn open_descriptor_count() -> usize {
        match fs::read_dir("/proc/self/fd") {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    #[test]
    fn empty_segment_creates_no_child() -> io::Result<()> {
        let executor = Executor::new(PathBuf::from("/nowhere"));
        assert_eq!(executor.run_single("")?, 0);
        assert_eq!(executor.run_single("   ")?, 0);
        assert_eq!(executor.run_single(" \t ")?, 0);
        Ok(())
    }

    #[test]
    fn pipeline_rejects_output_redirection_on_the_left() {
        let executor = Executor::new(PathBuf::from("/nowhere"));
        let err = executor.run_pipeline("left > out", "right").err();
        assert_eq!(err.map(|e| e.kind()), Some(io::ErrorKind::InvalidInput));
    }

    #[test]
    fn pipeline_rejects_input_redirection_on_the_right() {
        let executor = Executor::new(PathBuf::from("/nowhere"));
        let err = executor.run_pipeline("left", "right < in").err();
        assert_eq!(err.map(|e| e.kind()), Some(io::ErrorKind::InvalidInput));
    }

    #[test]
    fn pipeline_rejects_an_empty_side() {
        let executor = Executor::new(PathBuf::from("/nowhere"));
        for (left, right) in [("", "right"), ("left", ""), ("  ", "right"), ("< in", "right")] {
            let err = executor.run_pipeline(left, right).err();
            assert_eq!(err.map(|e| e.kind()), Some(io::ErrorKind::InvalidInput));
        }
    }

    #[test]
    fn missing_input_file_aborts_before_the_fork() {
        let root = scratch_root("missing-in", &["cat"]);
        let executor = Executor::new(root);
        let err = executor.run_single("cat < missingfile").err();
        assert_eq!(err.map(|e| e.kind()), Some(io::ErrorKind::NotFound));
    }

    #[test]
    fn single_command_with_output_redirection() -> io::Result<()> {
        let root = scratch_root("single-out", &["echo"]);
        let executor = Executor::new(root.clone());
        let code = executor.run_single("echo hello > out.txt")?;
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(root.join("out.txt"))?, "hello\n");
        Ok(())
    }

    #[test]
    fn single_command_with_input_redirection() -> io::Result<()> {
        let root = scratch_root("single-in", &["cat"]);
        fs::write(root.join("in.txt"), "from the file\n")?;
        let executor = Executor::new(root.clone());
        let code = executor.run_single("cat < in.txt > copied.txt")?;
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(root.join("copied.txt"))?, "from the file\n");
        Ok(())
    }

    #[test]
    fn pipeline_carries_bytes_into_the_redirected_file() -> io::Result<()> {
        let root = scratch_root("pipe-out", &["echo", "cat"]);
        let executor = Executor::new(root.clone());
        let code = executor.run_pipeline("echo through the pipe", "cat > out.txt")?;
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(root.join("out.txt"))?, "through the pipe\n");
        Ok(())
    }

    #[test]
    fn pipeline_accepts_input_redirection_on_the_left() -> io::Result<()> {
        let root = scratch_root("pipe-in", &["cat"]);
        fs::write(root.join("in.txt"), "pipe me\n")?;
        let executor = Executor::new(root.clone());
        let code = executor.run_pipeline("cat < in.txt", "cat > out.txt")?;
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(root.join("out.txt"))?, "pipe me\n");
        Ok(())
    }

    #[test]
    fn nonzero_child_exit_code_is_surfaced() -> io::Result<()> {
        let root = scratch_root("exit-code", &["false"]);
        let executor = Executor::new(root);
        let code = executor.run_single("false")?;
        assert_ne!(code, 0);
        Ok(())
    }

    #[test]
    fn descriptors_return_to_baseline_after_commands() -> io::Result<()> {
        let root = scratch_root("fd-baseline", &["echo", "cat"]);
        let executor = Executor::new(root.clone());

        // Warm-up pass so lazy one-time allocations do not skew the count.
        executor.run_pipeline("echo warmup", "cat > warm.txt")?;

        // Sibling tests in this harness open descriptors of their own, so a
        // single mismatched sample is retried before it counts as a leak.
        let mut matched = false;
        for _ in 0..3 {
            let baseline = open_descriptor_count();

            executor.run_pipeline("echo again", "cat > out.txt")?;
            let _ = executor.run_single("cat < missingfile");
            let _ = executor.run_pipeline("left > out", "right");
            executor.run_single("echo done > done.txt")?;

            if open_descriptor_count() == baseline {
                matched = true;
                break;
            }
        }
        assert!(matched, "descriptor count never returned to its baseline");
        Ok(())
    }
}
