//! Texture atlas description (Spine/libGDX text format).
//!
//! Accepts both the 3.x layout (`xy`/`size`/`orig`/`offset`, `rotate: true`) and
//! the 4.x layout (`bounds`/`offsets`, `rotate: 90`). A blank line ends a page;
//! the next name line starts a new one. Texture files are never opened.

use hashbrown::HashMap;

use crate::error::LoadError;

#[derive(Clone, Debug, PartialEq)]
pub struct AtlasPage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Premultiplied alpha.
    pub pma: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtlasRegion {
    pub name: String,
    pub page: usize,
    pub x: u32,
    pub y: u32,
    /// Unrotated size of the packed image.
    pub width: u32,
    pub height: u32,
    /// Packed rotated by 90 degrees.
    pub rotate: bool,
    /// Whitespace stripped from the left/bottom when packing.
    pub offset_x: f32,
    pub offset_y: f32,
    pub original_width: u32,
    pub original_height: u32,
    pub index: i32,
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Atlas {
    pub pages: Vec<AtlasPage>,
    pub regions: Vec<AtlasRegion>,
    by_name: HashMap<String, usize>,
}

struct Line<'a> {
    number: usize,
    text: &'a str,
}

impl Atlas {
    /// Parse atlas text. `path` is only used in error messages.
    pub fn parse(text: &str, path: &str) -> Result<Self, LoadError> {
        let err = |line: usize, message: String| LoadError::Atlas {
            path: path.to_string(),
            line,
            message,
        };

        let mut atlas = Atlas::default();
        let mut page: Option<usize> = None;
        let mut region: Option<usize> = None;

        for (i, raw) in text.lines().enumerate() {
            let line = Line {
                number: i + 1,
                text: raw.trim(),
            };
            if line.text.is_empty() {
                page = None;
                region = None;
                continue;
            }

            match split_entry(line.text) {
                Some((key, value)) => {
                    if let Some(r) = region {
                        apply_region_entry(&mut atlas.regions[r], key, value)
                            .map_err(|m| err(line.number, m))?;
                    } else if let Some(p) = page {
                        apply_page_entry(&mut atlas.pages[p], key, value)
                            .map_err(|m| err(line.number, m))?;
                    } else {
                        return Err(err(
                            line.number,
                            format!("entry '{key}' appears before any page"),
                        ));
                    }
                }
                None => match page {
                    None => {
                        atlas.pages.push(AtlasPage {
                            name: line.text.to_string(),
                            width: 0,
                            height: 0,
                            pma: false,
                        });
                        page = Some(atlas.pages.len() - 1);
                        region = None;
                    }
                    Some(p) => {
                        if atlas.by_name.contains_key(line.text) {
                            log::debug!(
                                "atlas '{path}': region '{}' repeated, keeping the first",
                                line.text
                            );
                        }
                        atlas.regions.push(AtlasRegion {
                            name: line.text.to_string(),
                            page: p,
                            x: 0,
                            y: 0,
                            width: 0,
                            height: 0,
                            rotate: false,
                            offset_x: 0.0,
                            offset_y: 0.0,
                            original_width: 0,
                            original_height: 0,
                            index: -1,
                            u: 0.0,
                            v: 0.0,
                            u2: 0.0,
                            v2: 0.0,
                        });
                        let idx = atlas.regions.len() - 1;
                        atlas.by_name.entry(line.text.to_string()).or_insert(idx);
                        region = Some(idx);
                    }
                },
            }
        }

        for region in &mut atlas.regions {
            let page = &atlas.pages[region.page];
            if page.width == 0 || page.height == 0 {
                return Err(err(
                    0,
                    format!("page '{}' has no size (needed by region '{}')", page.name, region.name),
                ));
            }
            if region.original_width == 0 && region.original_height == 0 {
                region.original_width = region.width;
                region.original_height = region.height;
            }
            let pw = page.width as f32;
            let ph = page.height as f32;
            region.u = region.x as f32 / pw;
            region.v = region.y as f32 / ph;
            if region.rotate {
                region.u2 = (region.x + region.height) as f32 / pw;
                region.v2 = (region.y + region.width) as f32 / ph;
            } else {
                region.u2 = (region.x + region.width) as f32 / pw;
                region.v2 = (region.y + region.height) as f32 / ph;
            }
        }

        log::debug!(
            "atlas '{path}': {} page(s), {} region(s)",
            atlas.pages.len(),
            atlas.regions.len()
        );
        Ok(atlas)
    }

    pub fn find(&self, name: &str) -> Option<&AtlasRegion> {
        self.by_name.get(name).map(|&i| &self.regions[i])
    }
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

fn parse_ints<const N: usize>(value: &str) -> Result<[i64; N], String> {
    let mut out = [0i64; N];
    let mut parts = value.split(',').map(str::trim);
    for slot in out.iter_mut() {
        let part = parts
            .next()
            .ok_or_else(|| format!("expected {N} comma-separated integers, got '{value}'"))?;
        *slot = part
            .parse::<i64>()
            .map_err(|e| format!("invalid integer '{part}': {e}"))?;
    }
    Ok(out)
}

fn to_u32(v: i64) -> Result<u32, String> {
    u32::try_from(v).map_err(|_| format!("value {v} is out of range"))
}

fn apply_page_entry(page: &mut AtlasPage, key: &str, value: &str) -> Result<(), String> {
    match key {
        "size" => {
            let [w, h] = parse_ints::<2>(value)?;
            page.width = to_u32(w)?;
            page.height = to_u32(h)?;
        }
        "pma" => page.pma = value == "true",
        // format/filter/repeat only matter to the texture loader
        _ => {}
    }
    Ok(())
}

fn apply_region_entry(region: &mut AtlasRegion, key: &str, value: &str) -> Result<(), String> {
    match key {
        "rotate" => {
            region.rotate = match value {
                "true" | "90" => true,
                "false" | "0" => false,
                other => return Err(format!("unsupported rotation '{other}'")),
            };
        }
        "xy" => {
            let [x, y] = parse_ints::<2>(value)?;
            region.x = to_u32(x)?;
            region.y = to_u32(y)?;
        }
        "size" => {
            let [w, h] = parse_ints::<2>(value)?;
            region.width = to_u32(w)?;
            region.height = to_u32(h)?;
        }
        "bounds" => {
            let [x, y, w, h] = parse_ints::<4>(value)?;
            region.x = to_u32(x)?;
            region.y = to_u32(y)?;
            region.width = to_u32(w)?;
            region.height = to_u32(h)?;
        }
        "orig" => {
            let [w, h] = parse_ints::<2>(value)?;
            region.original_width = to_u32(w)?;
            region.original_height = to_u32(h)?;
        }
        "offset" => {
            let [x, y] = parse_ints::<2>(value)?;
            region.offset_x = x as f32;
            region.offset_y = y as f32;
        }
        "offsets" => {
            let [x, y, w, h] = parse_ints::<4>(value)?;
            region.offset_x = x as f32;
            region.offset_y = y as f32;
            region.original_width = to_u32(w)?;
            region.original_height = to_u32(h)?;
        }
        "index" => {
            let [i] = parse_ints::<1>(value)?;
            region.index = i32::try_from(i).map_err(|_| format!("index {i} is out of range"))?;
        }
        // split/pad (nine-patch) are not used for skeleton attachments
        _ => {}
    }
    Ok(())
}
