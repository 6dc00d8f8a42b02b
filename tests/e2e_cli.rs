use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde_json::json;
use serial_test::serial;

struct TestEnv {
    home: PathBuf,
    bin: PathBuf,
}

static COMMAND_SEQ: AtomicU64 = AtomicU64::new(0);

impl TestEnv {
    fn new(prefix: &str) -> Self {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock failure")
            .as_nanos();
        let home = std::env::temp_dir().join(format!("radish-e2e-{prefix}-{nonce}"));
        let bin = home.join("bin");
        fs::create_dir_all(&bin).expect("failed to create fake bin directory");

        Self { home, bin }
    }

    fn command(&self, args: &[&str], extra_env: &[(&str, &str)]) -> (Command, PathBuf, PathBuf) {
        let command_id = COMMAND_SEQ.fetch_add(1, Ordering::Relaxed);
        let stdout_path = self.home.join(format!("cmd-{command_id}.stdout.log"));
        let stderr_path = self.home.join(format!("cmd-{command_id}.stderr.log"));
        let stdout_file = fs::File::create(&stdout_path).expect("failed to create stdout capture");
        let stderr_file = fs::File::create(&stderr_path).expect("failed to create stderr capture");

        let mut command = Command::new(env!("CARGO_BIN_EXE_radish"));
        command
            .args(args)
            .env_clear()
            .env("PATH", format!("{}:/usr/bin:/bin", self.bin.display()))
            .env("HOME", &self.home)
            .env("RUST_LOG", "debug")
            .current_dir(&self.home)
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file));
        for (key, value) in extra_env {
            command.env(key, value);
        }

        (command, stdout_path, stderr_path)
    }

    fn run(&self, args: &[&str], extra_env: &[(&str, &str)]) -> Output {
        let running = self.spawn(args, extra_env);
        running.wait(Duration::from_secs(60))
    }

    fn spawn(&self, args: &[&str], extra_env: &[(&str, &str)]) -> Running {
        let (mut command, stdout_path, stderr_path) = self.command(args, extra_env);
        let child = command.spawn().expect("failed to spawn radish command");
        Running {
            child,
            args: args.iter().map(|arg| arg.to_string()).collect(),
            stdout_path,
            stderr_path,
        }
    }

    fn write_file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.home.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directory");
        }
        fs::write(&path, contents).expect("failed to write fixture file");
        path
    }

    fn write_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.bin.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write fake binary");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("failed to make fake binary executable");
        path
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.home.join(relative)
    }

    fn write_descriptor(&self, data: serde_json::Value) -> PathBuf {
        let descriptor = json!({
            "Type": "Java",
            "Version": "1",
            "Data": data,
        });
        self.write_file(
            "radish.json",
            &serde_json::to_string_pretty(&descriptor).expect("failed to render descriptor"),
        )
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.home);
    }
}

struct Running {
    child: Child,
    args: Vec<String>,
    stdout_path: PathBuf,
    stderr_path: PathBuf,
}

impl Running {
    fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    fn wait(mut self, timeout: Duration) -> Output {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    return read_command_output(status, &self.stdout_path, &self.stderr_path)
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = self.child.kill();
                        let status = self
                            .child
                            .wait()
                            .expect("failed to wait for timed out radish command");
                        let output =
                            read_command_output(status, &self.stdout_path, &self.stderr_path);
                        panic!(
                            "radish command timed out after {:?}: {:?}\nstdout:\n{}\nstderr:\n{}",
                            timeout,
                            self.args,
                            String::from_utf8_lossy(&output.stdout),
                            String::from_utf8_lossy(&output.stderr)
                        );
                    }
                    sleep(Duration::from_millis(50));
                }
                Err(err) => {
                    panic!("failed while waiting for radish command {:?}: {err}", self.args);
                }
            }
        }
    }
}

fn read_command_output(status: ExitStatus, stdout_path: &Path, stderr_path: &Path) -> Output {
    let stdout = fs::read(stdout_path).expect("failed to read captured stdout");
    let stderr = fs::read(stderr_path).expect("failed to read captured stderr");
    let _ = fs::remove_file(stdout_path);
    let _ = fs::remove_file(stderr_path);

    Output {
        status,
        stdout,
        stderr,
    }
}

fn should_run_e2e(test_name: &str) -> bool {
    if std::env::var("RADISH_RUN_E2E").ok().as_deref() == Some("1") {
        true
    } else {
        eprintln!("skipping {test_name} (set RADISH_RUN_E2E=1 to run)");
        false
    }
}

fn wait_until<F>(timeout: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        sleep(Duration::from_millis(50));
    }
    predicate()
}

fn output_contains(output: &Output, needle: &str) -> bool {
    String::from_utf8_lossy(&output.stdout).contains(needle)
        || String::from_utf8_lossy(&output.stderr).contains(needle)
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read {}: {err}", path.display()))
        .lines()
        .map(str::to_string)
        .collect()
}

fn recording_script(args_file: &Path, tail: &str) -> String {
    format!(
        "printf '%s\\n' \"$@\" > '{}'\n{tail}",
        args_file.display()
    )
}

#[test]
#[serial]
fn e2e_java_derives_arguments_from_descriptor_and_environment() {
    if !should_run_e2e("e2e_java_derives_arguments_from_descriptor_and_environment") {
        return;
    }

    let env = TestEnv::new("java-args");
    env.write_file("app/lib/a.jar", "a");
    env.write_file("app/lib/b.jar", "b");
    let args_file = env.path("java.args");
    env.write_script("java", &recording_script(&args_file, "exit 0"));
    let descriptor = env.write_descriptor(json!({
        "Basedir": env.path("app").display().to_string(),
        "PathsToClassLibraries": ["lib"],
        "MainClass": "foo.bar.Main",
        "ApplicationArgs": "--greeting 'hello world' --home=$HOME",
        "JavaOptions": "-Dfrom.descriptor=1",
    }));
    let descriptor = descriptor.display().to_string();

    let output = env.run(
        &["java", &descriptor],
        &[
            ("JAVA_VERSION_MAJOR", "11"),
            ("JAVA_OPTIONS", "-Dfrom.env=${APP_NAME:-fallback}"),
        ],
    );
    assert!(
        output.status.success(),
        "java run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let args = read_lines(&args_file);
    let lib = env.path("app/lib");
    let cp = args
        .iter()
        .position(|arg| arg == "-cp")
        .expect("-cp should be present");
    assert_eq!(
        args[cp + 1],
        format!("{0}/a.jar:{0}/b.jar", lib.display())
    );
    let position = |value: &str| {
        args.iter()
            .position(|arg| arg == value)
            .unwrap_or_else(|| panic!("missing {value} in {args:?}"))
    };
    assert!(position("-Dfrom.descriptor=1") < position("-Dfrom.env=fallback"));
    assert!(args.iter().any(|arg| arg == "-XX:HeapDumpPath=/tmp"));
    assert_eq!(
        &args[args.len() - 4..],
        &[
            "foo.bar.Main".to_string(),
            "--greeting".to_string(),
            "hello world".to_string(),
            format!("--home={}", env.home.display()),
        ]
    );
}

#[test]
#[serial]
fn e2e_java_exit_code_passes_through() {
    if !should_run_e2e("e2e_java_exit_code_passes_through") {
        return;
    }

    let env = TestEnv::new("java-exit");
    env.write_script("java", "echo started; exit 7");
    let descriptor = env.write_descriptor(json!({ "MainClass": "Main" }));
    let descriptor = descriptor.display().to_string();

    let output = env.run(&["java", &descriptor], &[("JAVA_VERSION_MAJOR", "8")]);

    assert_eq!(output.status.code(), Some(7));
    assert!(String::from_utf8_lossy(&output.stdout).contains("started"));
}

#[test]
#[serial]
fn e2e_java_is_found_through_descriptor_environment_variable() {
    if !should_run_e2e("e2e_java_is_found_through_descriptor_environment_variable") {
        return;
    }

    let env = TestEnv::new("java-env-descriptor");
    let args_file = env.path("java.args");
    env.write_script("java", &recording_script(&args_file, "exit 0"));
    let descriptor = env.write_descriptor(json!({ "MainClass": "from.env.Main" }));
    let descriptor = descriptor.display().to_string();

    let output = env.run(
        &["run-java"],
        &[
            ("JAVA_VERSION_MAJOR", "17"),
            ("RADISH_DESCRIPTOR", descriptor.as_str()),
        ],
    );

    assert!(output.status.success());
    assert_eq!(
        read_lines(&args_file).last().map(String::as_str),
        Some("from.env.Main")
    );
}

#[test]
#[serial]
fn e2e_unsupported_java_version_is_fatal() {
    if !should_run_e2e("e2e_unsupported_java_version_is_fatal") {
        return;
    }

    let env = TestEnv::new("java-version");
    let args_file = env.path("java.args");
    env.write_script("java", &recording_script(&args_file, "exit 0"));
    let descriptor = env.write_descriptor(json!({ "MainClass": "Main" }));
    let descriptor = descriptor.display().to_string();

    let output = env.run(&["java", &descriptor], &[("JAVA_VERSION_MAJOR", "9")]);

    assert!(!output.status.success());
    assert!(output_contains(&output, "unsupported JAVA_VERSION_MAJOR"));
    assert!(!args_file.exists(), "java must not be started");
}

#[test]
#[serial]
fn e2e_missing_descriptor_is_fatal() {
    if !should_run_e2e("e2e_missing_descriptor_is_fatal") {
        return;
    }

    let env = TestEnv::new("java-descriptor");
    let args_file = env.path("java.args");
    env.write_script("java", &recording_script(&args_file, "exit 0"));
    let missing = env.path("nowhere/radish.json").display().to_string();

    let output = env.run(&["java", &missing], &[("JAVA_VERSION_MAJOR", "11")]);

    assert!(!output.status.success());
    assert!(output_contains(&output, "not accessible"));
    assert!(!args_file.exists(), "java must not be started");
}

#[test]
#[serial]
fn e2e_sigterm_is_forwarded_and_reported_as_success() {
    if !should_run_e2e("e2e_sigterm_is_forwarded_and_reported_as_success") {
        return;
    }

    let env = TestEnv::new("java-sigterm");
    let pid_file = env.path("java.pid");
    env.write_script(
        "java",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let descriptor = env.write_descriptor(json!({ "MainClass": "Main" }));
    let descriptor = descriptor.display().to_string();

    let running = env.spawn(&["java", &descriptor], &[("JAVA_VERSION_MAJOR", "11")]);
    assert!(
        wait_until(Duration::from_secs(10), || pid_file.exists()),
        "fake java never started"
    );
    kill(running.pid(), Signal::SIGTERM).expect("failed to signal radish");

    let output = running.wait(Duration::from_secs(20));
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
#[serial]
fn e2e_signal_forward_delay_holds_the_signal() {
    if !should_run_e2e("e2e_signal_forward_delay_holds_the_signal") {
        return;
    }

    let env = TestEnv::new("forward-delay");
    let pid_file = env.path("node.pid");
    env.write_script(
        "node",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );

    let running = env.spawn(
        &["nodejs", "server.js"],
        &[("RADISH_SIGNAL_FORWARD_DELAY", "1")],
    );
    assert!(
        wait_until(Duration::from_secs(10), || pid_file.exists()),
        "fake node never started"
    );
    let sent = Instant::now();
    kill(running.pid(), Signal::SIGINT).expect("failed to signal radish");

    let output = running.wait(Duration::from_secs(20));
    assert!(sent.elapsed() >= Duration::from_secs(1));
    assert_eq!(output.status.code(), Some(0));
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn e2e_orphaned_grandchildren_are_reaped() {
    if !should_run_e2e("e2e_orphaned_grandchildren_are_reaped") {
        return;
    }

    let env = TestEnv::new("orphans");
    let orphan_file = env.path("orphan.pid");
    env.write_script(
        "node",
        &format!(
            "sh -c 'sleep 0.3 & echo $! > \"{}\"'\nsleep 3\nexit 0",
            orphan_file.display()
        ),
    );

    let running = env.spawn(&["nodejs", "server.js"], &[]);
    assert!(
        wait_until(Duration::from_secs(10), || fs::read_to_string(&orphan_file)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)),
        "orphan was never started"
    );
    let orphan: u32 = fs::read_to_string(&orphan_file)
        .expect("failed to read orphan pid")
        .trim()
        .parse()
        .expect("orphan pid should be numeric");

    let proc_entry = PathBuf::from(format!("/proc/{orphan}"));
    assert!(
        wait_until(Duration::from_secs(2), || !proc_entry.exists()),
        "orphan {orphan} was left as a zombie"
    );

    let output = running.wait(Duration::from_secs(20));
    assert!(output.status.success());
}

#[test]
#[serial]
fn e2e_nginx_rotates_logs_and_requests_reopen() {
    if !should_run_e2e("e2e_nginx_rotates_logs_and_requests_reopen") {
        return;
    }

    let env = TestEnv::new("nginx");
    let args_file = env.path("nginx.args");
    let reopen_file = env.path("reopen.log");
    // The trap is installed before the arguments are recorded, so the
    // arguments file doubles as a readiness marker.
    env.write_script(
        "nginx",
        &format!(
            "trap 'echo reopened >> \"{}\"' USR1\nprintf '%s\\n' \"$@\" > '{}'\nwhile true; do sleep 0.1; done",
            reopen_file.display(),
            args_file.display()
        ),
    );
    let config = env.write_file("nginx.conf", "events {}\n");
    let access_log = env.path("logs/access.log");
    fs::create_dir_all(env.path("logs")).expect("failed to create log directory");

    let config = config.display().to_string();
    let access = access_log.display().to_string();
    let running = env.spawn(
        &[
            "nginx",
            "--config",
            &config,
            "--rotate-after-mb",
            "1",
            "--check-interval-ms",
            "100",
            "--log-file",
            &access,
        ],
        &[],
    );
    assert!(
        wait_until(Duration::from_secs(10), || args_file.exists()),
        "fake nginx never started"
    );
    fs::File::create(&access_log)
        .and_then(|file| file.set_len(2 * 1024 * 1024))
        .expect("failed to size access log");

    assert!(
        wait_until(Duration::from_secs(10), || reopen_file.exists()),
        "nginx never received SIGUSR1"
    );
    assert!(!access_log.exists());
    assert!(env.path("logs/access.1.log").exists());
    assert_eq!(read_lines(&reopen_file), vec!["reopened".to_string()]);
    assert_eq!(
        read_lines(&args_file),
        vec![
            "-g".to_string(),
            "daemon off;".to_string(),
            "-c".to_string(),
            config.clone(),
        ]
    );

    kill(running.pid(), Signal::SIGTERM).expect("failed to signal radish");
    let output = running.wait(Duration::from_secs(20));
    assert_eq!(output.status.code(), Some(0));
}

#[test]
#[serial]
fn e2e_classpath_prints_resolved_entries() {
    if !should_run_e2e("e2e_classpath_prints_resolved_entries") {
        return;
    }

    let env = TestEnv::new("classpath");
    env.write_file("app/lib/one.jar", "1");
    env.write_file("app/lib/two.jar", "2");
    env.write_file("app/deps/nested/three.jar", "3");
    env.write_file("app/deps/notes.txt", "ignored");
    env.write_file("app/extra.jar", "x");
    let descriptor = env.write_descriptor(json!({
        "Basedir": env.path("app").display().to_string(),
        "PathsToClassLibraries": ["lib", "deps/**", "extra.jar", "missing"],
        "MainClass": "Main",
    }));
    let descriptor = descriptor.display().to_string();

    let output = env.run(&["classpath", &descriptor], &[]);

    assert!(output.status.success());
    let app = env.path("app");
    let app = app.display();
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("{app}/lib/one.jar:{app}/lib/two.jar:{app}/deps/nested/three.jar:{app}/extra.jar")
    );
}

#[test]
#[serial]
fn e2e_terminate_sidecars_without_names_is_a_no_op() {
    if !should_run_e2e("e2e_terminate_sidecars_without_names_is_a_no_op") {
        return;
    }

    let env = TestEnv::new("sidecars");
    let output = env.run(&["terminate-sidecars"], &[]);
    assert!(output.status.success());
}
