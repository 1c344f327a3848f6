use std::{
    fmt::Write as _,
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    thread,
    time::Duration,
};

use chrono::Local;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use once_cell::sync::Lazy;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("seeder"));

/// 所有已建立 Logger 的寫檔通道，供 [`flush`] 一併清空
static WRITERS: Lazy<Mutex<Vec<Sender<Message>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// 等待寫檔執行緒清空佇列的上限
const FLUSH_TIMEOUT: Duration = Duration::from_secs(3);

enum Message {
    Line(String),
    Flush(Sender<()>),
}

/// 依等級分檔寫入 log/ 目錄，寫檔在背景執行緒進行
pub struct Logger {
    info_writer: Sender<Message>,
    warn_writer: Sender<Message>,
    error_writer: Sender<Message>,
    debug_writer: Sender<Message>,
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        let logger = Logger {
            info_writer: Self::create_writer(&format!("{}_info", log_name)),
            warn_writer: Self::create_writer(&format!("{}_warn", log_name)),
            error_writer: Self::create_writer(&format!("{}_error", log_name)),
            debug_writer: Self::create_writer(&format!("{}_debug", log_name)),
        };

        match WRITERS.lock() {
            Ok(mut writers) => writers.extend(logger.writers().into_iter().cloned()),
            Err(why) => error_console(&format!("Failed to register log writers because {}", why)),
        }

        logger
    }

    pub fn info(&self, log: String) {
        info_console(&log);
        self.send(log::Level::Info, log, &self.info_writer);
    }

    pub fn warn(&self, log: String) {
        warn_console(&log);
        self.send(log::Level::Warn, log, &self.warn_writer);
    }

    pub fn error(&self, log: String) {
        error_console(&log);
        self.send(log::Level::Error, log, &self.error_writer);
    }

    pub fn debug(&self, log: String) {
        self.send(log::Level::Debug, log, &self.debug_writer);
    }

    /// 阻塞直到每個寫檔執行緒都把已收到的訊息寫入檔案
    pub fn flush(&self) {
        flush_writers(self.writers());
    }

    fn writers(&self) -> [&Sender<Message>; 4] {
        [
            &self.info_writer,
            &self.warn_writer,
            &self.error_writer,
            &self.debug_writer,
        ]
    }

    fn send(&self, level: log::Level, msg: String, writer: &Sender<Message>) {
        let line = format!("{} {}", level, msg);
        if let Err(why) = writer.send(Message::Line(line)) {
            error_console(&why.to_string());
        }
    }

    fn create_writer(log_name: &str) -> Sender<Message> {
        let (tx, rx) = unbounded::<Message>();
        let log_path = Self::get_log_path(log_name);

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let file = log_path.and_then(|path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .ok()
            });

            match file {
                Some(file) => write_loop(BufWriter::new(file), rx),
                None => {
                    error_console("Failed to open log file, file logging disabled.");
                    discard_loop(rx);
                }
            }
        });

        tx
    }

    fn get_log_path(name: &str) -> Option<PathBuf> {
        let path = Path::new("log");

        if !path.exists() {
            fs::create_dir_all(path).ok()?;
        }

        let mut log_path = PathBuf::from(path);
        log_path.push(format!("{}_{}.log", Local::now().format("%Y-%m-%d"), name));

        Some(log_path)
    }
}

fn flush_writers<'a>(writers: impl IntoIterator<Item = &'a Sender<Message>>) {
    for writer in writers {
        let (ack_tx, ack_rx) = bounded::<()>(1);
        if writer.send(Message::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv_timeout(FLUSH_TIMEOUT);
        }
    }
}

fn write_loop(mut writer: BufWriter<File>, rx: Receiver<Message>) {
    let mut line = String::with_capacity(2048);

    for received in &rx {
        match received {
            Message::Line(msg) => {
                if writeln!(&mut line, "{} {}", Local::now().format("%F %X%.6f"), msg).is_err() {
                    continue;
                }

                if rx.is_empty() || line.len() >= 2048 {
                    write_out(&mut writer, &mut line);
                }
            }
            Message::Flush(ack) => {
                write_out(&mut writer, &mut line);
                let _ = ack.send(());
            }
        }
    }

    write_out(&mut writer, &mut line);
}

fn discard_loop(rx: Receiver<Message>) {
    for received in &rx {
        if let Message::Flush(ack) = received {
            let _ = ack.send(());
        }
    }
}

fn write_out(writer: &mut BufWriter<File>, line: &mut String) {
    if line.is_empty() {
        return;
    }

    if let Err(why) = writer.write_all(line.as_bytes()) {
        error_console(&format!(
            "Failed to write to log file. because:{:#?}\r\nmsg:{}",
            why, line
        ));
    }

    if let Err(why) = writer.flush() {
        error_console(&format!("Failed to flush log file. because:{:#?}", why));
    }

    line.clear();
}

pub fn info_file_async(log: impl Into<String>) {
    LOGGER.info(log.into());
}

pub fn warn_file_async(log: impl Into<String>) {
    LOGGER.warn(log.into());
}

pub fn error_file_async(log: impl Into<String>) {
    LOGGER.error(log.into());
}

pub fn debug_file_async(log: impl Into<String>) {
    LOGGER.debug(log.into());
}

/// 在程式結束前呼叫，確保每個 Logger 的背景執行緒都已將 log 寫入檔案
pub fn flush() {
    let writers = match WRITERS.lock() {
        Ok(writers) => writers.clone(),
        Err(why) => {
            error_console(&format!("Failed to read log writers because {}", why));
            return;
        }
    };

    flush_writers(&writers);
}

pub fn info_console(log: &str) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn warn_console(log: &str) {
    eprintln!(
        "{} Warn {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: &str) {
    eprintln!(
        "{} Error {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}
