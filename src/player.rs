//! # Player
//!
//! A dedicated worker thread that owns a [`FrameSource`] and drives it on
//! behalf of a caller: stepping, seeking and real-time playback. Commands
//! travel through a depth-1 channel and each one carries a completion signal
//! the caller can block on.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::PlayerConfig;
use crate::error::{CutterError, Result};
use crate::video::traits::FrameSource;

const MIN_SPEED: u32 = 20;
const MAX_SPEED: u32 = 500;
const SPEED_STEP: u32 = 20;

/// Snapshot handed to the frame callback whenever the current picture changes
#[derive(Debug, Clone)]
pub struct FrameInfo {
    pub position: i64,
    pub count: i64,
    pub width: u32,
    pub height: u32,
    pub frame: Vec<u8>,
}

pub type FrameCallback = Box<dyn FnMut(FrameInfo) + Send>;

type Task = Box<dyn FnOnce(&mut dyn FrameSource) + Send>;

enum Command {
    Play,
    PlayInterval { start: i64, end: i64 },
    Pause,
    Stop,
    Next,
    Prior,
    SeekFrame(i64),
    SeekTime(i64),
    Execute(Task),
    Quit,
}

struct Envelope {
    command: Command,
    done: Sender<()>,
}

/// Completion signal of a submitted command
pub struct Completion(Receiver<()>);

impl Completion {
    /// Block until the worker has handled the command
    pub fn wait(self) {
        // A disconnected worker counts as done
        let _ = self.0.recv();
    }

    pub fn is_done(&self) -> bool {
        !matches!(self.0.try_recv(), Err(TryRecvError::Empty))
    }
}

/// Sleep between frames while playing at `speed`, or `None` to run unpaced.
///
/// `fps` is clamped to `[1, 60]` and `speed` to at least 0.2; speeds above
/// 10 are not paced at all.
pub fn frame_delay(fps: f64, speed: f64) -> Option<Duration> {
    let speed = speed.max(0.2);
    if speed > 10.0 {
        return None;
    }

    let fps = if fps.is_finite() { fps.clamp(1.0, 60.0) } else { 1.0 };
    Some(Duration::from_secs_f64(1.0 / (fps * speed)))
}

/// Handle to a playback worker thread
pub struct Player {
    sender: SyncSender<Envelope>,
    speed: Arc<AtomicU32>,
    playing: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Player {
    /// Start the worker. `factory` runs on the worker thread to build the
    /// source, so the source itself never crosses threads. Fails if the
    /// factory fails.
    pub fn spawn<F, S>(factory: F, on_frame: Option<FrameCallback>) -> Result<Self>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
        S: FrameSource + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel::<Envelope>(1);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let speed = Arc::new(AtomicU32::new(100));
        let playing = Arc::new(AtomicBool::new(false));

        let worker_speed = Arc::clone(&speed);
        let worker_playing = Arc::clone(&playing);

        let handle = thread::Builder::new()
            .name("player".to_string())
            .spawn(move || {
                let source = match factory() {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(()));
                        source
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                Worker {
                    source,
                    receiver,
                    speed: worker_speed,
                    playing: worker_playing,
                    interval: None,
                    on_frame,
                }
                .run();
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CutterError::generic("player worker exited during startup"));
            }
        }

        Ok(Self {
            sender,
            speed,
            playing,
            handle: Some(handle),
        })
    }

    /// [`Player::spawn`] with the playback settings of `config` applied
    pub fn with_config<F, S>(
        factory: F,
        on_frame: Option<FrameCallback>,
        config: &PlayerConfig,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
        S: FrameSource + 'static,
    {
        let player = Self::spawn(factory, on_frame)?;
        player.set_speed(config.speed);
        debug!("Player speed set to {:.2}", player.speed());
        Ok(player)
    }

    fn submit(&self, command: Command) -> Completion {
        let (done, completion) = mpsc::channel();
        if self.sender.send(Envelope { command, done }).is_err() {
            warn!("Player worker is gone, command dropped");
        }
        Completion(completion)
    }

    pub fn play(&self) -> Completion {
        self.submit(Command::Play)
    }

    /// Loop over `start..=end` until paused
    pub fn play_interval(&self, start: i64, end: i64) -> Completion {
        self.submit(Command::PlayInterval { start, end })
    }

    pub fn pause(&self) -> Completion {
        self.submit(Command::Pause)
    }

    /// Pause and go back to the first frame
    pub fn stop(&self) -> Completion {
        self.submit(Command::Stop)
    }

    pub fn next(&self) -> Completion {
        self.submit(Command::Next)
    }

    pub fn prior(&self) -> Completion {
        self.submit(Command::Prior)
    }

    pub fn seek_frame(&self, frame: i64) -> Completion {
        self.submit(Command::SeekFrame(frame))
    }

    pub fn seek_time(&self, ms: i64) -> Completion {
        self.submit(Command::SeekTime(ms))
    }

    /// Run `task` on the worker with exclusive access to the source
    pub fn execute<F>(&self, task: F) -> Completion
    where
        F: FnOnce(&mut dyn FrameSource) + Send + 'static,
    {
        self.submit(Command::Execute(Box::new(task)))
    }

    /// Run `query` on the worker and wait for its result. `None` if the
    /// worker is gone.
    pub fn query<R, F>(&self, query: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn FrameSource) -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.execute(move |source| {
            let _ = tx.send(query(source));
        })
        .wait();
        rx.try_recv().ok()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn speed(&self) -> f64 {
        f64::from(self.speed.load(Ordering::SeqCst)) / 100.0
    }

    pub fn set_speed(&self, speed: f64) {
        let hundredths = (speed * 100.0 + 0.5).floor().max(0.0) as u32;
        self.speed.store(hundredths, Ordering::SeqCst);
    }

    /// Step the speed by 0.2 within `[0.2, 5.0]`, wrapping around at the ends
    pub fn change_speed(&self, increment: bool) {
        let current = self.speed.load(Ordering::SeqCst);
        let next = if increment {
            current + SPEED_STEP
        } else {
            current.saturating_sub(SPEED_STEP)
        };

        let next = if (MIN_SPEED..=MAX_SPEED).contains(&next) {
            next
        } else if increment {
            MIN_SPEED
        } else {
            MAX_SPEED
        };

        self.speed.store(next, Ordering::SeqCst);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.playing.store(false, Ordering::SeqCst);
        self.submit(Command::Quit);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Player worker panicked");
            }
        }
    }
}

struct Worker<S> {
    source: S,
    receiver: Receiver<Envelope>,
    speed: Arc<AtomicU32>,
    playing: Arc<AtomicBool>,
    interval: Option<(i64, i64)>,
    on_frame: Option<FrameCallback>,
}

impl<S: FrameSource> Worker<S> {
    fn run(mut self) {
        info!("Player worker started");

        loop {
            let envelope = if self.playing.load(Ordering::SeqCst) {
                match self.receiver.try_recv() {
                    Ok(envelope) => Some(envelope),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match self.receiver.recv() {
                    Ok(envelope) => Some(envelope),
                    Err(_) => break,
                }
            };

            if let Some(Envelope { command, done }) = envelope {
                let quit = matches!(command, Command::Quit);
                self.handle(command);
                let _ = done.send(());
                if quit {
                    break;
                }
                continue;
            }

            self.grab_frame();
        }

        debug!("Player worker stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Play => {
                self.interval = None;
                self.playing.store(true, Ordering::SeqCst);
            }
            Command::PlayInterval { start, end } => {
                debug!("Playing interval {}..={}", start, end);
                self.interval = Some((start.min(end), start.max(end)));
                self.playing.store(true, Ordering::SeqCst);
            }
            Command::Pause | Command::Quit => self.stop_playing(),
            Command::Stop => {
                self.stop_playing();
                self.source.seek_frame(0);
                self.notify();
            }
            Command::Next => {
                self.stop_playing();
                self.source.next();
                self.notify();
            }
            Command::Prior => {
                self.stop_playing();
                self.source.prior();
                self.notify();
            }
            Command::SeekFrame(frame) => {
                self.source.seek_frame(frame);
                self.notify();
            }
            Command::SeekTime(ms) => {
                self.source.seek_time(ms);
                self.notify();
            }
            Command::Execute(task) => task(&mut self.source),
        }
    }

    fn stop_playing(&mut self) {
        self.interval = None;
        self.playing.store(false, Ordering::SeqCst);
    }

    /// Advance one frame of playback and pace it
    fn grab_frame(&mut self) {
        let position = self.source.frame_number();

        match self.interval {
            Some((start, end)) => {
                if position >= end || position < start {
                    self.source.seek_frame(start);
                } else {
                    self.source.next();
                }
            }
            None => {
                if !self.source.next() || self.source.frame_number() >= self.source.frame_count() {
                    debug!("Playback reached the end at frame {}", self.source.frame_number());
                    self.playing.store(false, Ordering::SeqCst);
                }
            }
        }

        self.notify();

        let speed = f64::from(self.speed.load(Ordering::SeqCst)) / 100.0;
        if let Some(delay) = frame_delay(self.source.fps(), speed) {
            thread::sleep(delay);
        }
    }

    fn notify(&mut self) {
        let Some(on_frame) = self.on_frame.as_mut() else {
            return;
        };

        let (width, height) = (self.source.width(), self.source.height());
        let (position, count) = (self.source.frame_number(), self.source.frame_count());

        match self.source.picture() {
            Ok(picture) => on_frame(FrameInfo {
                position,
                count,
                width,
                height,
                frame: picture.to_vec(),
            }),
            Err(e) => warn!("Could not read frame {}: {}", position, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::traits::testing::SyntheticSource;
    use std::sync::Mutex;
    use std::time::Instant;

    fn spawn(frames: i64, on_frame: Option<FrameCallback>) -> Player {
        Player::spawn(move || Ok(SyntheticSource::new(16, 16, frames)), on_frame).unwrap()
    }

    fn position(player: &Player) -> i64 {
        player.query(|source| source.frame_number()).unwrap()
    }

    fn wait_until<F: Fn() -> bool>(condition: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_frame_delay() {
        assert_eq!(frame_delay(25.0, 1.0), Some(Duration::from_millis(40)));
        assert_eq!(frame_delay(0.5, 1.0), Some(Duration::from_secs(1)));
        assert_eq!(frame_delay(25.0, 0.0), Some(Duration::from_millis(200)));
        assert_eq!(frame_delay(25.0, 11.0), None);

        let fast = frame_delay(120.0, 1.0).unwrap();
        assert!((fast.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_stepping_and_seeking() {
        let player = spawn(100, None);

        player.seek_frame(10).wait();
        assert_eq!(position(&player), 10);

        player.next().wait();
        assert_eq!(position(&player), 11);

        player.prior().wait();
        assert_eq!(position(&player), 10);

        player.seek_time(2000).wait();
        assert_eq!(position(&player), 50);

        player.stop().wait();
        assert_eq!(position(&player), 1);
    }

    #[test]
    fn test_speed_wraps() {
        let player = spawn(10, None);
        assert_eq!(player.speed(), 1.0);

        player.change_speed(true);
        assert!((player.speed() - 1.2).abs() < 1e-9);

        player.set_speed(5.0);
        player.change_speed(true);
        assert!((player.speed() - 0.2).abs() < 1e-9);

        player.change_speed(false);
        assert!((player.speed() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_from_config() {
        let config: crate::config::Config = toml::from_str("[player]\nspeed = 2.4\n").unwrap();
        let player = Player::with_config(
            || Ok(SyntheticSource::new(16, 16, 10)),
            None,
            &config.player,
        )
        .unwrap();
        assert!((player.speed() - 2.4).abs() < 1e-9);

        player.change_speed(true);
        assert!((player.speed() - 2.6).abs() < 1e-9);
    }

    #[test]
    fn test_play_to_end() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: FrameCallback = Box::new(move |info: FrameInfo| {
            sink.lock().unwrap().push(info.position);
        });

        let player = spawn(12, Some(callback));
        player.set_speed(5.0);
        player.play().wait();

        wait_until(|| !player.is_playing());

        assert_eq!(position(&player), 11);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&2));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_play_interval_loops() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: FrameCallback = Box::new(move |info: FrameInfo| {
            sink.lock().unwrap().push(info.position);
        });

        let player = spawn(100, Some(callback));
        player.set_speed(5.0);
        player.play_interval(3, 5).wait();

        wait_until(|| seen.lock().unwrap().len() >= 8);
        player.pause().wait();
        assert!(!player.is_playing());

        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(|p| (3..=5).contains(p)));
        assert!(seen.windows(2).any(|w| w == [5, 3]));
    }

    #[test]
    fn test_execute_runs_on_worker() {
        let player = spawn(30, None);
        let (tx, rx) = mpsc::channel();

        player
            .execute(move |source| {
                source.seek_frame(7);
                tx.send(source.frame_count()).unwrap();
            })
            .wait();

        assert_eq!(rx.recv().unwrap(), 30);
        assert_eq!(position(&player), 7);
    }

    #[test]
    fn test_factory_failure() {
        let result = Player::spawn(
            || -> Result<SyntheticSource> { Err(CutterError::generic("no video")) },
            None,
        );
        assert!(result.is_err());
    }
}
