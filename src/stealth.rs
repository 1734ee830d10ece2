use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page as CrPage;

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// The user-agent string advertised to fingerprinting probes (Chrome on macOS).
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/145.0.0.0 Safari/537.36";

/// Chrome launch arguments that suppress automation tells.
/// Note: chromiumoxide adds the `--` prefix automatically, so keys must NOT include `--`.
/// Key-only args use `&str`, key-value args use `(&str, &str)`.
pub fn stealth_key_args() -> Vec<&'static str> {
    vec![
        "disable-infobars",
        "disable-default-apps",
        "disable-component-update",
        "no-first-run",
        "no-default-browser-check",
        "disable-background-timer-throttling",
        "disable-backgrounding-occluded-windows",
        "disable-renderer-backgrounding",
    ]
}

/// Key-value stealth args as tuples.
pub fn stealth_kv_args() -> Vec<(&'static str, &'static str)> {
    vec![
        ("disable-blink-features", "AutomationControlled"),
        ("user-agent", USER_AGENT),
    ]
}

/// Install the fingerprint overrides on a page so they run before any site JS.
/// Applied exactly once per page, before the first navigation. The overrides
/// only touch probe surfaces; functional page behavior is unchanged.
pub async fn apply_stealth(page: &CrPage, config: &EngineConfig) -> Result<()> {
    let script = format!(
        "{}\n{}",
        FINGERPRINT_JS,
        locale_overrides(config)
    );
    let params = AddScriptToEvaluateOnNewDocumentParams::new(script);
    page.execute(params)
        .await
        .map_err(|e| Error::JsError(format!("Failed to inject fingerprint overrides: {e}")))?;

    Ok(())
}

/// Overrides derived from configuration: language list and timezone offset.
/// `getTimezoneOffset` has to agree with the locale the user-agent claims,
/// otherwise the mismatch itself is a fingerprint.
fn locale_overrides(config: &EngineConfig) -> String {
    let lang = serde_json::to_string(&config.locale).unwrap_or_else(|_| "\"en-US\"".into());
    let base = config
        .locale
        .split('-')
        .next()
        .unwrap_or("en")
        .to_string();
    format!(
        r#"
Object.defineProperty(navigator, 'languages', {{
    get: () => [{lang}, '{base}'],
    configurable: true,
}});
Date.prototype.getTimezoneOffset = function() {{ return {offset}; }};
"#,
        lang = lang,
        base = base,
        offset = config.timezone_offset_minutes,
    )
}

/// Static probe-surface overrides, combined into one JS string.
static FINGERPRINT_JS: &str = r#"
// === navigator.webdriver ===
// Real non-automated Chrome exposes webdriver = false on Navigator.prototype;
// automated Chrome sets it true. Redefine on the prototype to match a real browser.
Object.defineProperty(Navigator.prototype, 'webdriver', {
    get: () => false,
    configurable: true,
    enumerable: true,
});

// === ChromeDriver globals ===
delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;

// === window.chrome runtime ===
if (!window.chrome) {
    window.chrome = {
        runtime: {
            onConnect: undefined,
            onMessage: undefined,
            connect: function() {},
            sendMessage: function() {},
        },
        loadTimes: function() { return {}; },
        csi: function() { return {}; },
        app: {
            isInstalled: false,
        },
    };
}

// === navigator.plugins (must pass instanceof PluginArray) ===
(function() {
    const makeFnNative = (fn, name) => {
        return new Proxy(fn, {
            get: (target, key) => {
                if (key === 'toString') return () => `function ${name}() { [native code] }`;
                return Reflect.get(target, key);
            }
        });
    };

    const fakePlugins = Object.create(PluginArray.prototype);
    const pluginData = [
        { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format', length: 1 },
        { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '', length: 1 },
        { name: 'Native Client', filename: 'internal-nacl-plugin', description: '', length: 2 },
    ];
    pluginData.forEach((p, i) => {
        const plugin = Object.create(Plugin.prototype);
        Object.defineProperties(plugin, {
            name: { value: p.name, enumerable: true },
            filename: { value: p.filename, enumerable: true },
            description: { value: p.description, enumerable: true },
            length: { value: p.length, enumerable: true },
        });
        fakePlugins[i] = plugin;
    });
    Object.defineProperty(fakePlugins, 'length', { value: 3, enumerable: true });

    fakePlugins.item = makeFnNative(function item(i) { return this[i] || null; }, 'item');
    fakePlugins.namedItem = makeFnNative(function namedItem(name) {
        for (let i = 0; i < this.length; i++) { if (this[i].name === name) return this[i]; }
        return null;
    }, 'namedItem');
    fakePlugins.refresh = makeFnNative(function refresh() {}, 'refresh');

    Object.defineProperty(navigator, 'plugins', {
        get: () => fakePlugins,
        configurable: true,
    });

    const fakeMimeTypes = Object.create(MimeTypeArray.prototype);
    Object.defineProperty(fakeMimeTypes, 'length', { value: 2, enumerable: true });
    Object.defineProperty(navigator, 'mimeTypes', {
        get: () => fakeMimeTypes,
        configurable: true,
    });
})();

// === navigator.platform ===
if (navigator.platform === '') {
    Object.defineProperty(navigator, 'platform', {
        get: () => 'MacIntel',
        configurable: true,
    });
}

// === hardware profile ===
if (!navigator.hardwareConcurrency) {
    Object.defineProperty(navigator, 'hardwareConcurrency', {
        get: () => 8,
        configurable: true,
    });
}
Object.defineProperty(navigator, 'deviceMemory', {
    get: () => 8,
    configurable: true,
});

// === Permissions.query ===
const originalQuery = window.Permissions && window.Permissions.prototype.query;
if (originalQuery) {
    window.Permissions.prototype.query = function(parameters) {
        if (parameters.name === 'notifications') {
            return Promise.resolve({ state: Notification.permission });
        }
        return originalQuery.call(this, parameters);
    };
}

// === WebGL vendor/renderer ===
const getParameterOrig = WebGLRenderingContext.prototype.getParameter;
WebGLRenderingContext.prototype.getParameter = function(param) {
    if (param === 0x9245) return 'Intel Inc.';               // UNMASKED_VENDOR_WEBGL
    if (param === 0x9246) return 'Intel Iris OpenGL Engine'; // UNMASKED_RENDERER_WEBGL
    return getParameterOrig.call(this, param);
};
if (window.WebGL2RenderingContext) {
    const getParameterOrig2 = WebGL2RenderingContext.prototype.getParameter;
    WebGL2RenderingContext.prototype.getParameter = function(param) {
        if (param === 0x9245) return 'Intel Inc.';
        if (param === 0x9246) return 'Intel Iris OpenGL Engine';
        return getParameterOrig2.call(this, param);
    };
}

// === window geometry ===
if (window.outerWidth === 0) {
    Object.defineProperty(window, 'outerWidth', {
        get: () => window.innerWidth,
        configurable: true,
    });
}
if (window.outerHeight === 0) {
    Object.defineProperty(window, 'outerHeight', {
        get: () => window.innerHeight + 85,
        configurable: true,
    });
}
Object.defineProperty(screen, 'availTop', {
    get: () => 0,
    configurable: true,
});

// === navigator.connection ===
if (!navigator.connection) {
    Object.defineProperty(navigator, 'connection', {
        get: () => ({
            effectiveType: '4g',
            rtt: 50,
            downlink: 10,
            saveData: false,
            onchange: null,
        }),
        configurable: true,
    });
}

// === battery API ===
if (!navigator.getBattery) {
    navigator.getBattery = () => Promise.resolve({
        charging: true,
        chargingTime: 0,
        dischargingTime: Infinity,
        level: 1,
        addEventListener: () => {},
        removeEventListener: () => {},
        dispatchEvent: () => true,
    });
}

// === Client Hints ===
if (navigator.userAgentData) {
    Object.defineProperty(navigator, 'userAgentData', {
        get: () => ({
            brands: [
                { brand: 'Google Chrome', version: '145' },
                { brand: 'Chromium', version: '145' },
                { brand: 'Not?A_Brand', version: '24' },
            ],
            mobile: false,
            platform: 'macOS',
            getHighEntropyValues: function(hints) {
                return Promise.resolve({
                    brands: this.brands,
                    mobile: false,
                    platform: 'macOS',
                    platformVersion: '15.3.0',
                    architecture: 'arm',
                    model: '',
                    uaFullVersion: '145.0.7632.117',
                });
            },
        }),
        configurable: true,
    });
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_overrides_embed_configured_offset() {
        let mut config = EngineConfig::default();
        config.locale = "de-DE".into();
        config.timezone_offset_minutes = -60;

        let js = locale_overrides(&config);
        assert!(js.contains("\"de-DE\", 'de'"));
        assert!(js.contains("return -60;"));
    }
}
