use std::path::Path;

/// Runs `func` with `HOME` pointing at a fresh temp dir; serialized because
/// the environment is process-wide.
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// Solid page with a light rounded "balloon" of dark scribbles, for render tests.
pub(crate) fn balloon_page(width: u32, height: u32) -> image::RgbaImage {
    image::RgbaImage::from_fn(width, height, |x, y| {
        let in_balloon = x > width / 8 && x < width * 7 / 8 && y > height / 8 && y < height * 7 / 8;
        if in_balloon && (x + y) % 9 == 0 && y % 4 != 0 {
            image::Rgba([20, 20, 20, 255])
        } else if in_balloon {
            image::Rgba([250, 250, 250, 255])
        } else {
            image::Rgba([90, 120, 160, 255])
        }
    })
}
