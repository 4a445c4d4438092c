/// Runs `f` with the given environment variables set (`Some`) or removed
/// (`None`), restoring the previous values afterwards.
///
/// Tests using this must be `#[serial]`: the environment is process-global.
pub fn scoped_env<F>(vars: &[(&str, Option<&str>)], f: F)
where
    F: FnOnce(),
{
    let saved: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(key, _)| (key.to_string(), std::env::var(key).ok()))
        .collect();

    for (key, value) in vars {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }

    f();

    for (key, previous) in saved {
        match previous {
            Some(value) => std::env::set_var(&key, value),
            None => std::env::remove_var(&key),
        }
    }
}
