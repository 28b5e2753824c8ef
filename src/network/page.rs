//! Landing Page
//!
//! Browser view of the bridge. Polls `/position` every 100 ms.

/// HTML served at `GET /` to clients that accept `text/html`.
pub const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>PS2 -> Roblox Bridge</title>
    <style>
        body { font-family: monospace; margin: 2em; }
        .online { color: green; }
        .stale { color: orange; }
    </style>
</head>
<body>
    <h1>PS2 -&gt; Roblox Bridge</h1>
    <p>Status: <span class="online">Online</span></p>
    <p>Position: <span id="pos">Loading...</span></p>
    <p>Roblox: <span id="roblox">-</span></p>
    <p>Feed: <span id="feed">-</span></p>
    <script>
        setInterval(() => {
            fetch('/position')
                .then(r => r.json())
                .then(data => {
                    document.getElementById('pos').textContent =
                        'X: ' + data.x.toFixed(2) + ', Y: ' + data.y.toFixed(2);
                    document.getElementById('roblox').textContent =
                        'X: ' + data.roblox_x + ', Y: ' + data.roblox_y;
                    const feed = document.getElementById('feed');
                    feed.textContent = data.isStale
                        ? 'stale (' + data.dataAge + ' ms)'
                        : 'live (#' + data.updateCount + ')';
                    feed.className = data.isStale ? 'stale' : 'online';
                })
                .catch(() => {});
        }, 100);
    </script>
</body>
</html>
"#;

/// Whether an `Accept` header prefers HTML.
pub fn wants_html(accept: Option<&str>) -> bool {
    accept.map_or(false, |value| value.contains("text/html"))
}
