use std::path::{PathBuf, Path};

pub fn get_app_dir() -> anyhow::Result<PathBuf> {
    let conf_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("dirs::config_dir()"))?;
    let mut path = PathBuf::from(&conf_dir);
    path.push(format!(".{}", env!("CARGO_PKG_NAME")));
    Ok(path)
}

pub fn save_json_to_file<T: serde::Serialize>(
    obj:       &T,
    file_name: &Path
) -> anyhow::Result<()> {
    if let Some(dir) = file_name.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let obj_str = serde_json::to_string_pretty(obj)?;
    std::fs::write(file_name, obj_str)?;
    Ok(())
}

/// Leaves `obj` untouched if file doesn't exist
pub fn load_json_from_file<T: serde::de::DeserializeOwned>(
    obj:       &mut T,
    file_name: &Path
) -> anyhow::Result<()> {
    if !file_name.is_file() { return Ok(()); }
    let file = std::io::BufReader::new(std::fs::File::open(file_name)?);
    *obj = serde_json::from_reader(file)?;
    Ok(())
}

pub fn get_app_conf_file_name(conf_name: &str) -> anyhow::Result<PathBuf> {
    let mut path = get_app_dir()?;
    path.push(format!("{}.json", conf_name));
    Ok(path)
}

pub fn save_json_to_config<T: serde::Serialize>(
    obj:       &T,
    conf_name: &str
) -> anyhow::Result<()> {
    let file_name = get_app_conf_file_name(conf_name)?;
    save_json_to_file(obj, &file_name)
}

pub fn load_json_from_config_file<T: serde::de::DeserializeOwned>(
    obj:       &mut T,
    conf_name: &str
) -> anyhow::Result<()> {
    let file_name = get_app_conf_file_name(conf_name)?;
    load_json_from_file(obj, &file_name)
}

#[test]
fn test_json_file_save_and_load() {
    let dir = std::env::temp_dir().join(format!("rotctl_scope_io_{}", std::process::id()));
    let file_name = dir.join("values.json");

    let mut loaded = vec![0_u32];
    load_json_from_file(&mut loaded, &file_name).unwrap();
    assert_eq!(loaded, vec![0]);

    save_json_to_file(&vec![1_u32, 2, 3], &file_name).unwrap();
    load_json_from_file(&mut loaded, &file_name).unwrap();
    assert_eq!(loaded, vec![1, 2, 3]);

    _ = std::fs::remove_dir_all(&dir);
}
